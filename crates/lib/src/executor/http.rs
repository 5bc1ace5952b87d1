//! REST executor.
//!
//! | Operation | Request                          |
//! |-----------|----------------------------------|
//! | execute   | `PUT {base}/indexes/{name}`      |
//! | delete    | `DELETE {base}/indexes/{name}`   |
//! | start     | `POST {base}/admin/startindexing`|
//! | stop      | `POST {base}/admin/stopindexing` |
//! | ping      | `GET {base}/build/version`       |
//!
//! Any 2xx response is success. Other responses become
//! `Failure("HTTP {status}: {body}")`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{BuildExecutor, ExecStatus, ExecutionControl};
use crate::unit::BuildUnit;

/// Per-request timeout used by [`HttpExecutor::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpExecutor {
  client: Client,
  base_url: Url,
  identifier: String,
}

impl HttpExecutor {
  pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
    Self::with_timeout(base_url, DEFAULT_TIMEOUT)
  }

  pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self::with_client(client, base_url))
  }

  pub fn with_client(client: Client, base_url: Url) -> Self {
    let identifier = base_url.as_str().trim_end_matches('/').to_string();
    Self {
      client,
      base_url,
      identifier,
    }
  }

  /// Base URL with `segments` appended, each percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, ExecStatus> {
    let mut url = self.base_url.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|_| ExecStatus::Failure(format!("{} cannot be used as a base URL", self.base_url)))?;
      path.pop_if_empty().extend(segments);
    }
    Ok(url)
  }

  async fn send(&self, request: RequestBuilder) -> ExecStatus {
    match request.send().await {
      Ok(response) if response.status().is_success() => ExecStatus::Success,
      Ok(response) => {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ExecStatus::Failure(format!("HTTP {status}: {}", body.trim()))
      }
      Err(e) => ExecStatus::Failure(format!("request failed: {e}")),
    }
  }
}

#[async_trait]
impl BuildExecutor for HttpExecutor {
  fn identifier(&self) -> &str {
    &self.identifier
  }

  fn remote_address(&self) -> Option<&str> {
    Some(self.base_url.as_str())
  }

  async fn execute(&self, unit: &BuildUnit, cancel: &CancellationToken) -> ExecStatus {
    let url = match self.endpoint(&["indexes", unit.name()]) {
      Ok(url) => url,
      Err(status) => return status,
    };
    debug!(unit = unit.name(), %url, "putting index");

    let request = self.client.put(url).json(&unit.definition().payload());

    tokio::select! {
      biased;
      _ = cancel.cancelled() => ExecStatus::Cancelled,
      status = self.send(request) => status,
    }
  }

  async fn delete(&self, name: &str) -> ExecStatus {
    match self.endpoint(&["indexes", name]) {
      Ok(url) => self.send(self.client.delete(url)).await,
      Err(status) => status,
    }
  }

  async fn control(&self, signal: ExecutionControl) -> ExecStatus {
    let action = match signal {
      ExecutionControl::Start => "startindexing",
      ExecutionControl::Stop => "stopindexing",
    };
    match self.endpoint(&["admin", action]) {
      Ok(url) => self.send(self.client.post(url)).await,
      Err(status) => status,
    }
  }

  async fn ping(&self) -> ExecStatus {
    match self.endpoint(&["build", "version"]) {
      Ok(url) => self.send(self.client.get(url)).await,
      Err(status) => status,
    }
  }
}
