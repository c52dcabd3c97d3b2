//! reqwest-backed executor for the REST API.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::token::TokenSource;
use super::{HttpExecutor, ReplayResponse, RequestOptions};

/// Replays actions against the configured API.
///
/// The base URL is taken from config once, at construction. The bearer token
/// is read from the token source on every request, so a refreshed session is
/// picked up without rebuilding the executor.
#[derive(Clone)]
pub struct ApiExecutor {
  client: reqwest::Client,
  base_url: Url,
  tokens: Arc<dyn TokenSource>,
}

impl ApiExecutor {
  pub fn new(base_url: Url, timeout: Duration, tokens: Arc<dyn TokenSource>) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self::from_client(client, base_url, tokens))
  }

  /// Executor around an already configured client.
  pub fn from_client(
    client: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
  ) -> Self {
    Self {
      client,
      base_url,
      tokens,
    }
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }
}

impl HttpExecutor for ApiExecutor {
  type Response = reqwest::Response;

  async fn execute(&self, endpoint: &str, options: RequestOptions) -> Result<reqwest::Response> {
    let url = resolve_url(&self.base_url, endpoint);
    let headers = with_bearer(options.headers, self.tokens.token());
    let has_content_type = headers
      .keys()
      .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));

    debug!(method = %options.method, %url, "replaying request");

    let mut request = self.client.request(options.method.into(), url.as_str());
    for (name, value) in &headers {
      request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = options.body {
      if !has_content_type {
        request = request.header(CONTENT_TYPE, "application/json");
      }
      request = request.body(body);
    }

    request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))
  }
}

impl ReplayResponse for reqwest::Response {
  fn is_ok(&self) -> bool {
    self.status().is_success()
  }

  async fn text(self) -> Result<String> {
    reqwest::Response::text(self)
      .await
      .map_err(|e| eyre!("Failed to read response body: {}", e))
  }
}

/// Join an action endpoint onto the base URL.
///
/// Endpoints are paths relative to the base (a leading slash does not reset
/// the base path). Absolute URLs are used as-is.
fn resolve_url(base: &Url, endpoint: &str) -> String {
  if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
    return endpoint.to_string();
  }
  format!(
    "{}/{}",
    base.as_str().trim_end_matches('/'),
    endpoint.trim_start_matches('/')
  )
}

/// Add `Authorization: Bearer <token>` when a token is present.
fn with_bearer(
  mut headers: BTreeMap<String, String>,
  token: Option<String>,
) -> BTreeMap<String, String> {
  if let Some(token) = token {
    headers.retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION.as_str()));
    headers.insert("Authorization".to_string(), format!("Bearer {}", token));
  }
  headers
}
