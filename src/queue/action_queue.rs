//! Durable action queue and its replay pass.

use color_eyre::Result;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::action::{ActionType, NewAction, QueuedAction};
use super::storage;
use crate::clock::Clock;
use crate::db::Database;
use crate::guard::ReentrancyGuard;
use crate::transport::{HttpExecutor, ReplayResponse, RequestOptions};

/// Failed attempts after which an action is dropped on the next pass.
pub const MAX_RETRIES: u32 = 3;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
  /// Actions replayed successfully and removed
  pub processed: usize,
  /// Actions that failed this pass or were dropped as poisoned
  pub failed: usize,
}

/// Durable FIFO of mutating requests waiting to be replayed.
///
/// Storage errors are returned to the caller: unlike the cache, losing a
/// queued write silently is not acceptable.
pub struct ActionQueue {
  db: Arc<Database>,
  clock: Arc<dyn Clock>,
  processing: AtomicBool,
}

impl ActionQueue {
  pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
    Self {
      db,
      clock,
      processing: AtomicBool::new(false),
    }
  }

  /// Persist a new action and return its id.
  pub async fn enqueue(&self, action: NewAction) -> Result<i64> {
    let now = self.clock.now_ms();
    let id = self
      .db
      .with_conn(|conn| storage::insert(conn, &action, now))
      .await?;

    info!(
      id,
      action_type = %action.action_type,
      method = %action.method,
      endpoint = %action.endpoint,
      "queued action"
    );
    Ok(id)
  }

  /// All queued actions in replay order.
  pub async fn get_all(&self) -> Result<Vec<QueuedAction>> {
    self.db.with_conn(|conn| storage::select_all(conn)).await
  }

  /// Queued actions of one type, in replay order.
  pub async fn get_by_type(&self, action_type: ActionType) -> Result<Vec<QueuedAction>> {
    self
      .db
      .with_conn(|conn| storage::select_by_type(conn, action_type))
      .await
  }

  /// Remove an action. Removing one that is already gone does nothing.
  pub async fn dequeue(&self, id: i64) -> Result<()> {
    let removed = self.db.with_conn(|conn| storage::delete(conn, id)).await?;
    if !removed {
      debug!(id, "dequeue of missing action ignored");
    }
    Ok(())
  }

  /// Record a failed attempt on an action that may have been removed meanwhile.
  pub async fn update_retry(&self, id: i64, retries: u32, last_error: Option<&str>) -> Result<()> {
    let updated = self
      .db
      .with_conn(|conn| storage::update_retry(conn, id, retries, last_error))
      .await?;
    if !updated {
      debug!(id, "retry update for missing action ignored");
    }
    Ok(())
  }

  pub async fn clear(&self) -> Result<()> {
    let removed = self.db.with_conn(|conn| storage::delete_all(conn)).await?;
    info!(removed, "cleared action queue");
    Ok(())
  }

  pub async fn size(&self) -> Result<usize> {
    self.db.with_conn(|conn| storage::count(conn)).await
  }

  /// Whether a drain pass is running on this instance.
  pub fn is_processing(&self) -> bool {
    self.processing.load(std::sync::atomic::Ordering::Acquire)
  }

  /// Replay every queued action once, oldest first.
  ///
  /// Only one pass runs per instance; a call made while another is in flight
  /// returns an empty result without touching the queue. Actions enqueued
  /// during a pass are left for the next one.
  ///
  /// An action already at [`MAX_RETRIES`] is dropped without being sent. A
  /// non-2xx response or transport error bumps its retry count and keeps it
  /// queued. If the outcome of one action cannot be written back, that
  /// action counts as failed and the pass moves on; only a failure to read
  /// the queue up front is returned as an error.
  pub async fn process_queue<E: HttpExecutor>(&self, executor: &E) -> Result<ProcessResult> {
    let Some(_guard) = ReentrancyGuard::acquire(&self.processing) else {
      debug!("drain already in progress, skipping");
      return Ok(ProcessResult::default());
    };

    let snapshot = self.get_all().await?;
    let mut result = ProcessResult::default();
    if snapshot.is_empty() {
      return Ok(result);
    }

    info!(queued = snapshot.len(), "replaying queued actions");

    // One at a time: later actions may depend on earlier ones.
    for action in snapshot {
      let id = action.id;
      match self.replay_one(executor, action).await {
        Ok(Replay::Sent) => result.processed += 1,
        Ok(Replay::Failed) | Ok(Replay::Dropped) => result.failed += 1,
        Err(e) => {
          // Outcome could not be written back; the row stays as it was and
          // is looked at again next pass.
          warn!(id, error = %format!("{:#}", e), "failed to record replay outcome");
          result.failed += 1;
        }
      }
    }

    info!(
      processed = result.processed,
      failed = result.failed,
      "drain pass finished"
    );
    Ok(result)
  }

  /// Send one action and write its outcome back to the store.
  async fn replay_one<E: HttpExecutor>(&self, executor: &E, action: QueuedAction) -> Result<Replay> {
    if action.retries >= MAX_RETRIES {
      warn!(
        id = action.id,
        endpoint = %action.endpoint,
        retries = action.retries,
        last_error = action.last_error.as_deref().unwrap_or_default(),
        "dropping action that exhausted its retries"
      );
      self.dequeue(action.id).await?;
      return Ok(Replay::Dropped);
    }

    let options = RequestOptions::for_action(&action);
    let failure = match executor.execute(&action.endpoint, options).await {
      Ok(response) if response.is_ok() => None,
      Ok(response) => Some(
        response
          .text()
          .await
          .unwrap_or_else(|e| format!("{:#}", e)),
      ),
      Err(e) => Some(format!("{:#}", e)),
    };

    match failure {
      None => {
        debug!(id = action.id, endpoint = %action.endpoint, "action replayed");
        self.dequeue(action.id).await?;
        Ok(Replay::Sent)
      }
      Some(error) => {
        let retries = action.retries + 1;
        warn!(
          id = action.id,
          endpoint = %action.endpoint,
          retries,
          error = %error,
          "action replay failed"
        );
        self.update_retry(action.id, retries, Some(&error)).await?;
        Ok(Replay::Failed)
      }
    }
  }
}

enum Replay {
  Sent,
  Failed,
  Dropped,
}
