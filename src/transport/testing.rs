//! In-process executors for tests.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{HttpExecutor, ReplayResponse, RequestOptions};

#[derive(Debug, Clone)]
pub enum Outcome {
  Ok,
  Status(String),
  NetworkError(String),
}

#[derive(Debug)]
pub struct FakeResponse {
  ok: bool,
  body: String,
}

impl ReplayResponse for FakeResponse {
  fn is_ok(&self) -> bool {
    self.ok
  }

  async fn text(self) -> Result<String> {
    Ok(self.body)
  }
}

/// Answers per endpoint, `Ok` by default, and records every call.
#[derive(Default)]
pub struct ScriptedExecutor {
  outcomes: Mutex<HashMap<String, Outcome>>,
  calls: Mutex<Vec<(String, RequestOptions)>>,
  gate: Option<Gate>,
}

/// Lets a test hold an executor call open until it says so.
#[derive(Clone, Default)]
pub struct Gate {
  pub entered: Arc<Notify>,
  pub release: Arc<Notify>,
}

impl ScriptedExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn gated(gate: Gate) -> Self {
    Self {
      gate: Some(gate),
      ..Self::default()
    }
  }

  pub fn respond(self, endpoint: &str, outcome: Outcome) -> Self {
    self
      .outcomes
      .lock()
      .unwrap()
      .insert(endpoint.to_string(), outcome);
    self
  }

  pub fn fail_all(self, endpoints: &[&str]) -> Self {
    endpoints.iter().fold(self, |exec, endpoint| {
      exec.respond(endpoint, Outcome::Status("server error".to_string()))
    })
  }

  pub fn calls(&self) -> Vec<(String, RequestOptions)> {
    self.calls.lock().unwrap().clone()
  }

  pub fn called_endpoints(&self) -> Vec<String> {
    self.calls().into_iter().map(|(endpoint, _)| endpoint).collect()
  }
}

impl HttpExecutor for ScriptedExecutor {
  type Response = FakeResponse;

  async fn execute(&self, endpoint: &str, options: RequestOptions) -> Result<FakeResponse> {
    self
      .calls
      .lock()
      .unwrap()
      .push((endpoint.to_string(), options));

    if let Some(gate) = &self.gate {
      gate.entered.notify_one();
      gate.release.notified().await;
    }

    let outcome = self
      .outcomes
      .lock()
      .unwrap()
      .get(endpoint)
      .cloned()
      .unwrap_or(Outcome::Ok);

    match outcome {
      Outcome::Ok => Ok(FakeResponse {
        ok: true,
        body: String::new(),
      }),
      Outcome::Status(body) => Ok(FakeResponse { ok: false, body }),
      Outcome::NetworkError(msg) => Err(eyre!(msg)),
    }
  }
}
