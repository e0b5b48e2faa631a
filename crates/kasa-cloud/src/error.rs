// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Failure below the envelope layer: the request never produced a JSON reply.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response is not valid JSON: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Request(e.to_string())
    }
}

#[derive(Debug, Error, Clone)]
pub enum AuthError {
    #[error("login rejected by cloud (error_code {code}): {msg}")]
    LoginRejected { code: i64, msg: String },

    #[error("login response carried no token")]
    MissingToken,

    #[error("device listing rejected by cloud (error_code {code}): {msg}")]
    ListingRejected { code: i64, msg: String },

    #[error("malformed cloud response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is not authenticated")]
    AuthRequired,

    #[error("no device with alias {0:?}")]
    NotFound(String),
}

#[derive(Debug, Error, Clone)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("cloud rejected passthrough (error_code {code}): {msg}")]
    Cloud { code: i64, msg: String },

    #[error("device returned err_code {code}")]
    Device { code: i64 },

    #[error("malformed device response: {0}")]
    Malformed(String),
}
