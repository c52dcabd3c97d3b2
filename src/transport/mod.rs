//! Executor contract used to replay queued actions.
//!
//! The queue only knows these two traits; [`ApiExecutor`] is the reqwest
//! implementation used in production.

mod api;
mod token;

#[cfg(test)]
pub(crate) mod testing;

use color_eyre::Result;
use std::collections::BTreeMap;
use std::future::Future;

use crate::queue::{HttpMethod, QueuedAction};

pub use api::ApiExecutor;
pub use token::{EnvToken, SessionFile, StaticToken, TokenSource};

/// Request shape handed to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
  pub method: HttpMethod,
  pub headers: BTreeMap<String, String>,
  /// JSON-encoded body, if the action carries one
  pub body: Option<String>,
}

impl RequestOptions {
  pub fn for_action(action: &QueuedAction) -> Self {
    Self {
      method: action.method,
      headers: action.headers.clone().unwrap_or_default(),
      body: action.body.as_ref().map(|body| body.to_string()),
    }
  }
}

/// Response from a replayed request.
pub trait ReplayResponse: Send {
  /// Whether the request succeeded (2xx).
  fn is_ok(&self) -> bool;

  /// Consume the response and read its body as text.
  fn text(self) -> impl Future<Output = Result<String>> + Send;
}

/// Sends one request. An `Err` means the request never got a response.
pub trait HttpExecutor: Send + Sync {
  type Response: ReplayResponse;

  fn execute(
    &self,
    endpoint: &str,
    options: RequestOptions,
  ) -> impl Future<Output = Result<Self::Response>> + Send;
}
