//! SQL for the `cache` table.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::entry::CacheEntry;

pub(super) fn upsert(conn: &Connection, entry: &CacheEntry) -> Result<()> {
  let data =
    serde_json::to_string(&entry.data).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache (key, data, timestamp, expires_at)
       VALUES (?, ?, ?, ?)",
      params![entry.key, data, entry.timestamp, entry.expires_at],
    )
    .map_err(|e| eyre!("Failed to store cache entry {}: {}", entry.key, e))?;

  Ok(())
}

pub(super) fn fetch(conn: &Connection, key: &str) -> Result<Option<CacheEntry>> {
  let row: Option<(String, i64, Option<i64>)> = conn
    .query_row(
      "SELECT data, timestamp, expires_at FROM cache WHERE key = ?",
      params![key],
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()
    .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

  match row {
    Some((data, timestamp, expires_at)) => {
      let data = serde_json::from_str(&data)
        .map_err(|e| eyre!("Failed to deserialize cache entry {}: {}", key, e))?;
      Ok(Some(CacheEntry {
        key: key.to_string(),
        data,
        timestamp,
        expires_at,
      }))
    }
    None => Ok(None),
  }
}

pub(super) fn remove(conn: &Connection, key: &str) -> Result<()> {
  conn
    .execute("DELETE FROM cache WHERE key = ?", params![key])
    .map_err(|e| eyre!("Failed to delete cache entry {}: {}", key, e))?;
  Ok(())
}

pub(super) fn remove_all(conn: &Connection) -> Result<()> {
  conn
    .execute("DELETE FROM cache", [])
    .map_err(|e| eyre!("Failed to clear cache: {}", e))?;
  Ok(())
}

pub(super) fn keys(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn
    .prepare("SELECT key FROM cache ORDER BY key")
    .map_err(|e| eyre!("Failed to prepare key listing: {}", e))?;

  let keys = stmt
    .query_map([], |row| row.get(0))
    .map_err(|e| eyre!("Failed to list cache keys: {}", e))?
    .collect::<rusqlite::Result<Vec<String>>>()?;

  Ok(keys)
}

/// Delete every entry with `expires_at <= now_ms`, returning how many went.
///
/// The predicate is served by `idx_cache_expires_at`; rows with a NULL expiry
/// never match it.
pub(super) fn remove_expired(conn: &Connection, now_ms: i64) -> Result<usize> {
  let removed = conn
    .execute(
      "DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at <= ?",
      params![now_ms],
    )
    .map_err(|e| eyre!("Failed to remove expired cache entries: {}", e))?;
  Ok(removed)
}
