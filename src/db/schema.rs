//! Versioned schema for the durable store.

use rusqlite_migration::{Migrations, M};

/// Schema version the code expects after all migrations ran.
pub const SCHEMA_VERSION: usize = 2;

/// Ordered list of upgrades.
///
/// SQLite's `user_version` pragma records how many have been applied; on open,
/// every migration past that point runs in sequence. Each statement is written
/// with `IF NOT EXISTS` so a store that already has a table or index is left
/// alone.
pub fn migrations() -> Migrations<'static> {
  Migrations::new(vec![
    // 1: response cache
    M::up(
      r#"
      CREATE TABLE IF NOT EXISTS cache (
          key TEXT PRIMARY KEY,
          data TEXT NOT NULL,
          timestamp INTEGER NOT NULL,
          expires_at INTEGER
      );

      CREATE INDEX IF NOT EXISTS idx_cache_expires_at ON cache(expires_at);
      "#,
    ),
    // 2: pending action queue
    M::up(
      r#"
      CREATE TABLE IF NOT EXISTS queue (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          type TEXT NOT NULL,
          endpoint TEXT NOT NULL,
          method TEXT NOT NULL,
          body TEXT,
          headers TEXT,
          timestamp INTEGER NOT NULL,
          retries INTEGER NOT NULL DEFAULT 0,
          last_error TEXT
      );

      CREATE INDEX IF NOT EXISTS idx_queue_timestamp ON queue(timestamp);
      CREATE INDEX IF NOT EXISTS idx_queue_type ON queue(type);
      "#,
    ),
  ])
}
