//! Bearer token sources.
//!
//! Tokens are read on every request rather than once at startup, so a token
//! refreshed by another part of the application is picked up immediately.

use std::path::PathBuf;
use tracing::debug;

/// Supplies the current bearer token, if there is a session.
pub trait TokenSource: Send + Sync {
  fn token(&self) -> Option<String>;
}

/// Reads the token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvToken {
  var: String,
}

impl EnvToken {
  pub fn new(var: impl Into<String>) -> Self {
    Self { var: var.into() }
  }
}

impl TokenSource for EnvToken {
  fn token(&self) -> Option<String> {
    std::env::var(&self.var)
      .ok()
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty())
  }
}

/// Reads the token from a session file written by the auth layer.
#[derive(Debug, Clone)]
pub struct SessionFile {
  path: PathBuf,
}

impl SessionFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl TokenSource for SessionFile {
  fn token(&self) -> Option<String> {
    match std::fs::read_to_string(&self.path) {
      Ok(contents) => Some(contents.trim().to_string()).filter(|t| !t.is_empty()),
      Err(e) => {
        debug!(path = %self.path.display(), error = %e, "no session token");
        None
      }
    }
  }
}

/// Fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
  fn token(&self) -> Option<String> {
    self.0.clone()
  }
}
