//! SQL for the `queue` table.

use color_eyre::{eyre::eyre, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;

use super::action::{ActionType, NewAction, QueuedAction};

const SELECT_COLUMNS: &str =
  "SELECT id, type, endpoint, method, body, headers, timestamp, retries, last_error FROM queue";

pub(super) fn insert(conn: &Connection, action: &NewAction, timestamp: i64) -> Result<i64> {
  let body = action
    .body
    .as_ref()
    .map(serde_json::to_string)
    .transpose()
    .map_err(|e| eyre!("Failed to serialize action body: {}", e))?;
  let headers = action
    .headers
    .as_ref()
    .map(serde_json::to_string)
    .transpose()
    .map_err(|e| eyre!("Failed to serialize action headers: {}", e))?;

  conn
    .execute(
      "INSERT INTO queue (type, endpoint, method, body, headers, timestamp, retries, last_error)
       VALUES (?, ?, ?, ?, ?, ?, 0, NULL)",
      params![
        action.action_type,
        action.endpoint,
        action.method,
        body,
        headers,
        timestamp
      ],
    )
    .map_err(|e| eyre!("Failed to enqueue action: {}", e))?;

  Ok(conn.last_insert_rowid())
}

pub(super) fn select_all(conn: &Connection) -> Result<Vec<QueuedAction>> {
  let mut stmt = conn
    .prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))
    .map_err(|e| eyre!("Failed to prepare queue query: {}", e))?;

  let actions = stmt
    .query_map([], map_row)
    .map_err(|e| eyre!("Failed to read queue: {}", e))?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(|e| eyre!("Failed to decode queued action: {}", e))?;

  Ok(actions)
}

pub(super) fn select_by_type(
  conn: &Connection,
  action_type: ActionType,
) -> Result<Vec<QueuedAction>> {
  let mut stmt = conn
    .prepare(&format!("{} WHERE type = ? ORDER BY id", SELECT_COLUMNS))
    .map_err(|e| eyre!("Failed to prepare queue query: {}", e))?;

  let actions = stmt
    .query_map(params![action_type], map_row)
    .map_err(|e| eyre!("Failed to read queue: {}", e))?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(|e| eyre!("Failed to decode queued action: {}", e))?;

  Ok(actions)
}

pub(super) fn select_one(conn: &Connection, id: i64) -> Result<Option<QueuedAction>> {
  conn
    .query_row(
      &format!("{} WHERE id = ?", SELECT_COLUMNS),
      params![id],
      map_row,
    )
    .optional()
    .map_err(|e| eyre!("Failed to read queued action {}: {}", id, e))
}

pub(super) fn delete(conn: &Connection, id: i64) -> Result<bool> {
  let removed = conn
    .execute("DELETE FROM queue WHERE id = ?", params![id])
    .map_err(|e| eyre!("Failed to dequeue action {}: {}", id, e))?;
  Ok(removed > 0)
}

/// Overwrite `retries` and `last_error`, leaving every other column alone.
///
/// Load and write happen in one transaction so a concurrent delete either
/// lands before (nothing to update) or after (row gone afterwards).
/// The stored retry count never goes down.
pub(super) fn update_retry(
  conn: &mut Connection,
  id: i64,
  retries: u32,
  last_error: Option<&str>,
) -> Result<bool> {
  let tx = conn
    .transaction()
    .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

  let Some(current) = select_one(&tx, id)? else {
    return Ok(false);
  };

  tx.execute(
    "UPDATE queue SET retries = ?, last_error = ? WHERE id = ?",
    params![current.retries.max(retries), last_error, id],
  )
  .map_err(|e| eyre!("Failed to update retries for action {}: {}", id, e))?;

  tx.commit()
    .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

  Ok(true)
}

pub(super) fn delete_all(conn: &Connection) -> Result<usize> {
  conn
    .execute("DELETE FROM queue", [])
    .map_err(|e| eyre!("Failed to clear queue: {}", e))
}

pub(super) fn count(conn: &Connection) -> Result<usize> {
  let count: i64 = conn
    .query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))
    .map_err(|e| eyre!("Failed to count queue: {}", e))?;
  Ok(count as usize)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<QueuedAction> {
  Ok(QueuedAction {
    id: row.get(0)?,
    action_type: row.get(1)?,
    endpoint: row.get(2)?,
    method: row.get(3)?,
    body: json_column(row, 4)?,
    headers: json_column(row, 5)?,
    timestamp: row.get(6)?,
    retries: row.get(7)?,
    last_error: row.get(8)?,
  })
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
  let raw: Option<String> = row.get(idx)?;
  raw
    .map(|text| {
      serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
