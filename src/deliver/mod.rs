//! Payload delivery to HTTP targets.
//!
//! The payload is serialized once and POSTed to every target
//! concurrently. Each target succeeds or fails on its own; there are no
//! retries, the next cycle delivers a fresh payload anyway.

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Content type sent with every payload.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Maximum number of response body bytes kept in a status error.
const MAX_ERROR_BODY: usize = 512;

/// Identifying User-Agent header value.
pub fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Why delivery to one target failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No response within the per-request timeout.
    #[error("request to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    /// Connection or protocol failure.
    #[error("request to {target} failed: {source}")]
    Network {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    /// The target answered with a non-2xx status.
    #[error("target {target} responded with {status}: {body}")]
    Status {
        target: String,
        status: StatusCode,
        body: String,
    },
}

/// Result of delivering to one target.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub target: String,
    pub result: Result<StatusCode, DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Sends expanded payloads to the configured targets.
#[derive(Debug, Clone)]
pub struct PayloadDeliverer {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl PayloadDeliverer {
    /// Create a deliverer with a bounded per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(http_client, timeout))
    }

    /// Use a preconfigured client. `timeout` is only used for reporting;
    /// the client is expected to enforce it.
    pub fn with_client(http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    /// Serialize `payload` once and POST it to every target.
    ///
    /// Outcomes are returned in target order. One target's failure or
    /// timeout never affects another.
    pub async fn deliver(
        &self,
        payload: &Value,
        targets: &[String],
    ) -> serde_json::Result<Vec<DeliveryOutcome>> {
        if targets.is_empty() {
            warn!("No delivery targets configured, payload not sent");
            return Ok(Vec::new());
        }

        let body = serde_json::to_vec(payload)?;
        let agent = user_agent();

        let requests = targets
            .iter()
            .map(|target| self.send(target, body.clone(), &agent));

        Ok(join_all(requests).await)
    }

    async fn send(&self, target: &str, body: Vec<u8>, agent: &str) -> DeliveryOutcome {
        info!("Sending payload to: {}", target);

        let result = self.post(target, body, agent).await;
        match &result {
            Ok(status) => info!("Response from {} [{}]", target, status),
            Err(e) => error!("Delivery failed: {}", e),
        }

        DeliveryOutcome {
            target: target.to_string(),
            result,
        }
    }

    async fn post(
        &self,
        target: &str,
        body: Vec<u8>,
        agent: &str,
    ) -> Result<StatusCode, DeliveryError> {
        let response = self
            .http_client
            .post(target)
            .header(USER_AGENT, agent)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(target, e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate(&mut body, MAX_ERROR_BODY);
            return Err(DeliveryError::Status {
                target: target.to_string(),
                status,
                body,
            });
        }

        Ok(status)
    }

    fn classify(&self, target: &str, e: reqwest::Error) -> DeliveryError {
        if e.is_timeout() {
            DeliveryError::Timeout {
                target: target.to_string(),
                timeout: self.timeout,
            }
        } else {
            DeliveryError::Network {
                target: target.to_string(),
                source: e,
            }
        }
    }
}

/// Truncate to at most `max` bytes on a character boundary.
fn truncate(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
