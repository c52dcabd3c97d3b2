//! Queued action types.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of mutation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
  Create,
  Update,
  Delete,
  Upload,
  Custom,
}

/// HTTP verb used when replaying an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Delete,
  Patch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseVariantError {
  kind: &'static str,
  value: String,
}

impl ActionType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Create => "create",
      Self::Update => "update",
      Self::Delete => "delete",
      Self::Upload => "upload",
      Self::Custom => "custom",
    }
  }
}

impl HttpMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Get => "GET",
      Self::Post => "POST",
      Self::Put => "PUT",
      Self::Delete => "DELETE",
      Self::Patch => "PATCH",
    }
  }
}

impl FromStr for ActionType {
  type Err = ParseVariantError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "create" => Ok(Self::Create),
      "update" => Ok(Self::Update),
      "delete" => Ok(Self::Delete),
      "upload" => Ok(Self::Upload),
      "custom" => Ok(Self::Custom),
      _ => Err(ParseVariantError {
        kind: "action type",
        value: s.to_string(),
      }),
    }
  }
}

impl FromStr for HttpMethod {
  type Err = ParseVariantError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "GET" => Ok(Self::Get),
      "POST" => Ok(Self::Post),
      "PUT" => Ok(Self::Put),
      "DELETE" => Ok(Self::Delete),
      "PATCH" => Ok(Self::Patch),
      _ => Err(ParseVariantError {
        kind: "HTTP method",
        value: s.to_string(),
      }),
    }
  }
}

impl fmt::Display for ActionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<HttpMethod> for reqwest::Method {
  fn from(method: HttpMethod) -> Self {
    match method {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Delete => reqwest::Method::DELETE,
      HttpMethod::Patch => reqwest::Method::PATCH,
    }
  }
}

// Both enums are stored as their text form.

impl ToSql for ActionType {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(ToSqlOutput::from(self.as_str()))
  }
}

impl FromSql for ActionType {
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    value
      .as_str()?
      .parse()
      .map_err(|e| FromSqlError::Other(Box::new(e)))
  }
}

impl ToSql for HttpMethod {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(ToSqlOutput::from(self.as_str()))
  }
}

impl FromSql for HttpMethod {
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    value
      .as_str()?
      .parse()
      .map_err(|e| FromSqlError::Other(Box::new(e)))
  }
}

/// An action as submitted by application code, before the queue assigns
/// its id, timestamp and retry count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAction {
  #[serde(rename = "type")]
  pub action_type: ActionType,
  pub endpoint: String,
  pub method: HttpMethod,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub headers: Option<BTreeMap<String, String>>,
}

impl NewAction {
  pub fn new(action_type: ActionType, method: HttpMethod, endpoint: impl Into<String>) -> Self {
    Self {
      action_type,
      endpoint: endpoint.into(),
      method,
      body: None,
      headers: None,
    }
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self
      .headers
      .get_or_insert_with(BTreeMap::new)
      .insert(name.into(), value.into());
    self
  }
}

/// A pending mutation persisted in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
  /// Store-assigned, strictly increasing; defines replay order
  pub id: i64,
  #[serde(rename = "type")]
  pub action_type: ActionType,
  pub endpoint: String,
  pub method: HttpMethod,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub headers: Option<BTreeMap<String, String>>,
  /// Enqueue time (epoch ms)
  pub timestamp: i64,
  /// Failed replay attempts so far
  pub retries: u32,
  /// Response body or error message from the last failed attempt
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_error: Option<String>,
}
