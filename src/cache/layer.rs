//! Fail-open cache layer over the durable store.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::storage;
use crate::clock::Clock;
use crate::db::Database;

/// Durable key/value cache with optional per-entry expiry.
///
/// Reads never fail: a missing, expired or unreadable entry is `None`, and a
/// broken store is logged and treated as empty. The cache never fetches on a
/// miss; callers re-fetch from the source and `set` the result.
pub struct OfflineCache {
  db: Arc<Database>,
  clock: Arc<dyn Clock>,
}

impl OfflineCache {
  pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
    Self { db, clock }
  }

  /// Open the underlying store.
  ///
  /// Safe to call repeatedly and from several tasks at once. Other methods
  /// open the store on demand, so calling this is only needed to surface an
  /// open failure early.
  pub async fn init(&self) -> Result<()> {
    self.db.init().await?;
    Ok(())
  }

  /// Get a cached value, or `None` if absent, expired or undecodable.
  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let entry = self.entry(key).await?;
    match serde_json::from_value(entry.data) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "cached value has unexpected shape");
        None
      }
    }
  }

  /// Get the raw entry including its expiry metadata.
  ///
  /// Follows the same expiry rule as [`OfflineCache::get`]: an expired entry
  /// is deleted and reported absent.
  pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
    let now = self.clock.now_ms();
    let result = self
      .db
      .with_conn(|conn| match storage::fetch(conn, key)? {
        Some(entry) if entry.is_expired(now) => {
          debug!(key, "evicting expired cache entry on read");
          storage::remove(conn, key)?;
          Ok(None)
        }
        found => Ok(found),
      })
      .await;

    fail_open("get", result, None)
  }

  /// Store `data` under `key`, replacing any previous value and expiry.
  pub async fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) {
    let data = match serde_json::to_value(data) {
      Ok(data) => data,
      Err(e) => {
        warn!(key, error = %e, "value is not cacheable");
        return;
      }
    };

    let now = self.clock.now_ms();
    let entry = CacheEntry {
      key: key.to_string(),
      data,
      timestamp: now,
      expires_at: ttl.map(|ttl| {
        now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
      }),
    };

    let result = self.db.with_conn(|conn| storage::upsert(conn, &entry)).await;
    fail_open("set", result, ());
  }

  /// Remove `key`. Missing keys are fine.
  pub async fn delete(&self, key: &str) {
    let result = self.db.with_conn(|conn| storage::remove(conn, key)).await;
    fail_open("delete", result, ());
  }

  /// Remove every entry.
  pub async fn clear(&self) {
    let result = self.db.with_conn(|conn| storage::remove_all(conn)).await;
    fail_open("clear", result, ());
  }

  /// Every key physically present, expired or not.
  pub async fn get_all_keys(&self) -> Vec<String> {
    let result = self.db.with_conn(|conn| storage::keys(conn)).await;
    fail_open("get_all_keys", result, Vec::new())
  }

  /// Delete all entries whose expiry has passed. Returns how many were removed.
  pub async fn cleanup_expired(&self) -> usize {
    let now = self.clock.now_ms();
    let result = self
      .db
      .with_conn(|conn| storage::remove_expired(conn, now))
      .await;

    let removed = fail_open("cleanup_expired", result, 0);
    if removed > 0 {
      debug!(removed, "removed expired cache entries");
    }
    removed
  }
}

fn fail_open<T>(op: &'static str, result: Result<T>, fallback: T) -> T {
  result.unwrap_or_else(|e| {
    warn!(op, error = %e, "offline cache unavailable, using fallback");
    fallback
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Order {
    id: u64,
    total: f64,
  }

  fn create_test_cache() -> (OfflineCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let cache = OfflineCache::new(Arc::new(Database::in_memory()), clock.clone());
    (cache, clock)
  }

  fn broken_cache() -> (OfflineCache, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();
    let db = Database::open(blocker.join("offline.db"));
    (
      OfflineCache::new(Arc::new(db), Arc::new(ManualClock::new(0))),
      dir,
    )
  }

  #[tokio::test]
  async fn test_set_then_get_roundtrips() {
    let (cache, _clock) = create_test_cache();
    let order = Order { id: 7, total: 12.5 };

    cache
      .set("order:7", &order, Some(Duration::from_secs(60)))
      .await;
    assert_eq!(cache.get::<Order>("order:7").await, Some(order));
  }

  #[tokio::test]
  async fn test_missing_key_is_none() {
    let (cache, _clock) = create_test_cache();
    assert_eq!(cache.get::<Order>("nope").await, None);
  }

  #[tokio::test]
  async fn test_expired_entry_is_deleted_on_read() {
    let (cache, clock) = create_test_cache();
    cache
      .set("short", &json!({"a": 1}), Some(Duration::from_millis(1)))
      .await;

    clock.advance(2);
    assert_eq!(cache.get::<serde_json::Value>("short").await, None);
    assert!(!cache.get_all_keys().await.contains(&"short".to_string()));
  }

  #[tokio::test]
  async fn test_huge_ttl_saturates_instead_of_expiring() {
    let (cache, clock) = create_test_cache();
    cache
      .set("long", &1, Some(Duration::from_secs(u64::MAX)))
      .await;

    clock.advance(1_000_000_000);
    assert_eq!(cache.get::<i32>("long").await, Some(1));
    assert_eq!(
      cache.entry("long").await.unwrap().expires_at,
      Some(i64::MAX)
    );
  }

  #[tokio::test]
  async fn test_entry_without_ttl_never_expires() {
    let (cache, clock) = create_test_cache();
    cache.set("forever", &"value", None).await;

    clock.advance(365 * 24 * 60 * 60 * 1000);
    assert_eq!(
      cache.get::<String>("forever").await,
      Some("value".to_string())
    );
    assert_eq!(cache.entry("forever").await.unwrap().expires_at, None);
  }

  #[tokio::test]
  async fn test_set_overwrites_value_and_expiry() {
    let (cache, clock) = create_test_cache();
    cache
      .set("k", &1, Some(Duration::from_millis(10)))
      .await;
    cache.set("k", &2, None).await;

    clock.advance(1_000);
    assert_eq!(cache.get::<i32>("k").await, Some(2));
  }

  #[tokio::test]
  async fn test_wrong_type_reads_as_none() {
    let (cache, _clock) = create_test_cache();
    cache.set("k", &"not an order", None).await;
    assert_eq!(cache.get::<Order>("k").await, None);
  }

  #[tokio::test]
  async fn test_delete_missing_key_is_noop() {
    let (cache, _clock) = create_test_cache();
    cache.set("a", &1, None).await;

    cache.delete("b").await;
    cache.delete("a").await;
    cache.delete("a").await;
    assert!(cache.get_all_keys().await.is_empty());
  }

  #[tokio::test]
  async fn test_get_all_keys_includes_expired_entries() {
    let (cache, clock) = create_test_cache();
    cache.set("a", &1, Some(Duration::from_millis(5))).await;
    cache.set("b", &2, None).await;

    clock.advance(10);
    assert_eq!(cache.get_all_keys().await, vec!["a", "b"]);
  }

  #[tokio::test]
  async fn test_cleanup_removes_only_expired() {
    let (cache, clock) = create_test_cache();
    cache.set("gone-1", &1, Some(Duration::from_millis(5))).await;
    cache.set("gone-2", &2, Some(Duration::from_millis(10))).await;
    cache.set("alive", &3, Some(Duration::from_secs(60))).await;
    cache.set("forever", &4, None).await;

    // gone-2 expires exactly now; cleanup treats that as expired.
    clock.advance(10);
    assert_eq!(cache.cleanup_expired().await, 2);
    assert_eq!(cache.get_all_keys().await, vec!["alive", "forever"]);
    assert_eq!(cache.cleanup_expired().await, 0);
  }

  #[tokio::test]
  async fn test_clear_removes_everything() {
    let (cache, _clock) = create_test_cache();
    cache.set("a", &1, None).await;
    cache.set("b", &2, Some(Duration::from_secs(1))).await;

    cache.clear().await;
    assert!(cache.get_all_keys().await.is_empty());
  }

  #[tokio::test]
  async fn test_broken_store_fails_open() {
    let (cache, _dir) = broken_cache();

    assert!(cache.init().await.is_err());
    cache.set("k", &1, None).await;
    assert_eq!(cache.get::<i32>("k").await, None);
    assert!(cache.get_all_keys().await.is_empty());
    assert_eq!(cache.cleanup_expired().await, 0);
    cache.delete("k").await;
    cache.clear().await;
  }

  #[tokio::test]
  async fn test_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offline.test.db");
    let clock = Arc::new(ManualClock::new(0));

    {
      let cache = OfflineCache::new(Arc::new(Database::open(&path)), clock.clone());
      cache.set("persisted", &json!({"n": 1}), None).await;
    }

    let cache = OfflineCache::new(Arc::new(Database::open(&path)), clock);
    assert_eq!(
      cache.get::<serde_json::Value>("persisted").await,
      Some(json!({"n": 1}))
    );
  }
}
