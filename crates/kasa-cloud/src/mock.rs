// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::TransportError, transport::Transport};

/// A request seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub token: Option<String>,
    pub body: Value,
}

/// A pre-scripted transport.  Each call to `post` pops the next reply from
/// the front of the queue and records what was sent, so tests can drive a
/// whole session without network access.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Result<Value, TransportError>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: every scripted reply succeeds.
    pub fn replies(replies: Vec<Value>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            token: token.map(str::to_string),
            body,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no more scripted replies".into())))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn pops_replies_in_order_and_records_requests() {
        let t = ScriptedTransport::replies(vec![json!({ "n": 1 }), json!({ "n": 2 })]);
        let first = t.post("http://a", None, json!({ "method": "x" })).await.unwrap();
        let second = t.post("http://b", Some("tok"), json!({})).await.unwrap();
        assert_eq!(first["n"], 1);
        assert_eq!(second["n"], 2);

        let seen = t.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].url, "http://a");
        assert_eq!(seen[0].token, None);
        assert_eq!(seen[1].token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn exhausted_script_is_a_transport_error() {
        let t = ScriptedTransport::default();
        let err = t.post("http://a", None, json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Request(m) if m.contains("no more")));
    }
}
