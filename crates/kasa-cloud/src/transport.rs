// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;

/// JSON-over-POST channel to the cloud.
///
/// Implementations send `body` to `url`, appending `?token=<token>` when a
/// token is given, and return the decoded JSON reply.  Vendor-level errors
/// (`error_code != 0`) are *not* a transport failure; they come back as a
/// normal reply for the envelope layer to interpret.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<Value, TransportError>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Transport whose requests fail after `timeout` elapses.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<Value, TransportError> {
        debug!(%url, method = body["method"].as_str().unwrap_or(""), "posting to kasa cloud");

        let mut req = self.client.post(url).json(&body);
        if let Some(t) = token {
            req = req.query(&[("token", t)]);
        }
        let resp = req.send().await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
