//! Durable store shared by the offline cache and the action queue.
//!
//! One SQLite database holds both the `cache` and `queue` tables. The
//! connection is opened lazily on first use, and concurrent first callers
//! share a single in-flight open, including its failure, instead of racing
//! their own.

pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Failures of the storage engine itself, as opposed to a failing query.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
  /// The engine could not be opened at all.
  #[error("storage unavailable: {0}")]
  Unavailable(String),
  /// The schema could not be brought up to the current version.
  #[error("schema migration failed: {0}")]
  Migration(String),
  /// A previous holder of the connection lock panicked.
  #[error("storage lock poisoned")]
  Poisoned,
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
  File(PathBuf),
  /// Private in-memory database, gone when the handle is dropped.
  Memory,
}

/// Handle to the durable store.
///
/// Cheap to construct; nothing touches disk until [`Database::init`] or the
/// first query.
pub struct Database {
  location: StoreLocation,
  conn: OnceCell<Mutex<Connection>>,
  /// Held while an open is in flight; keeps the last failure for the
  /// callers that were waiting on it.
  opening: tokio::sync::Mutex<Option<StoreError>>,
  /// Finished open attempts, successful or not.
  attempts: AtomicU64,
}

impl Database {
  /// Handle for a database file at `path`.
  pub fn open(path: impl AsRef<Path>) -> Self {
    Self::new(StoreLocation::File(path.as_ref().to_path_buf()))
  }

  /// Handle for a throwaway in-memory database.
  pub fn in_memory() -> Self {
    Self::new(StoreLocation::Memory)
  }

  pub fn new(location: StoreLocation) -> Self {
    Self {
      location,
      conn: OnceCell::new(),
      opening: tokio::sync::Mutex::new(None),
      attempts: AtomicU64::new(0),
    }
  }

  /// Default database path under the user's data directory.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("offsync").join("offline.db"))
  }

  pub fn location(&self) -> &StoreLocation {
    &self.location
  }

  /// Open the engine and run pending migrations.
  ///
  /// Idempotent. If the open fails, the error is returned to every caller
  /// waiting on it and the next call tries again.
  pub async fn init(&self) -> Result<(), StoreError> {
    self.connection().await.map(|_| ())
  }

  async fn connection(&self) -> Result<&Mutex<Connection>, StoreError> {
    if let Some(conn) = self.conn.get() {
      return Ok(conn);
    }

    let seen = self.attempts.load(Ordering::Acquire);
    let mut last_error = self.opening.lock().await;
    if let Some(conn) = self.conn.get() {
      return Ok(conn);
    }
    // An attempt finished while we waited: it was ours too.
    if self.attempts.load(Ordering::Acquire) != seen {
      if let Some(err) = last_error.as_ref() {
        return Err(err.clone());
      }
    }

    let location = self.location.clone();
    let opened = tokio::task::spawn_blocking(move || open_connection(&location))
      .await
      .map_err(|e| StoreError::Unavailable(format!("open task failed: {}", e)))
      .and_then(|result| result);
    self.attempts.fetch_add(1, Ordering::AcqRel);

    match opened {
      Ok(conn) => {
        *last_error = None;
        Ok(self.conn.get_or_init(|| async { Mutex::new(conn) }).await)
      }
      Err(e) => {
        warn!(error = %e, "failed to open offline store");
        *last_error = Some(e.clone());
        Err(e)
      }
    }
  }

  /// Run `f` against the open connection.
  ///
  /// The lock is taken after the connection is ready and released before
  /// returning, so it is never held across an await point.
  pub async fn with_conn<R>(&self, f: impl FnOnce(&mut Connection) -> Result<R>) -> Result<R> {
    let conn = self.connection().await?;
    let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
    f(&mut guard)
  }
}

fn open_connection(location: &StoreLocation) -> Result<Connection, StoreError> {
  let mut conn = match location {
    StoreLocation::File(path) => {
      if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
          StoreError::Unavailable(format!(
            "failed to create directory {}: {}",
            parent.display(),
            e
          ))
        })?;
      }

      let conn = Connection::open(path).map_err(|e| {
        StoreError::Unavailable(format!("failed to open {}: {}", path.display(), e))
      })?;

      conn
        .execute_batch(
          r#"
          PRAGMA journal_mode = WAL;
          PRAGMA synchronous = NORMAL;
          "#,
        )
        .map_err(|e| StoreError::Unavailable(format!("failed to configure database: {}", e)))?;

      info!(path = %path.display(), "opened offline store");
      conn
    }
    StoreLocation::Memory => {
      debug!("opening in-memory offline store");
      Connection::open_in_memory()
        .map_err(|e| StoreError::Unavailable(format!("failed to open in-memory database: {}", e)))?
    }
  };

  schema::migrations()
    .to_latest(&mut conn)
    .map_err(|e| StoreError::Migration(e.to_string()))?;

  Ok(conn)
}
