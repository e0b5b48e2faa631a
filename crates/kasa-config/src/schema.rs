// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use anyhow::Context;
use serde::{Deserialize, Serialize};

fn default_cloud_url() -> String {
    "https://wap.tplinkcloud.com/".into()
}

fn default_app_type() -> String {
    "Kasa_Android".into()
}

fn default_password_env() -> String {
    "KASA_PASSWORD".into()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

impl Config {
    /// Copy with every secret replaced, for `show-config`.
    pub fn redacted(&self) -> Self {
        let mut c = self.clone();
        if c.account.password.is_some() {
            c.account.password = Some("<redacted>".into());
        }
        c
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Account endpoint for login and device listing.
    #[serde(default = "default_cloud_url")]
    pub url: String,
    /// Client identifier sent as `appType` at login.
    #[serde(default = "default_app_type")]
    pub app_type: String,
    /// Per-request HTTP timeout.  Unset means no timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            url: default_cloud_url(),
            app_type: default_app_type(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Kasa account email (`cloudUserName`).
    pub email: Option<String>,
    /// Environment variable that holds the password (read at runtime)
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// File whose first line is the password.  `~` is expanded.
    pub password_file: Option<String>,
    /// Explicit password; prefer password_env or password_file so secrets
    /// stay out of config files
    pub password: Option<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            email: None,
            password_env: default_password_env(),
            password_file: None,
            password: None,
        }
    }
}

impl AccountConfig {
    /// Password from, in order: `password_env`, `password_file`, `password`.
    pub fn resolve_password(&self) -> anyhow::Result<Option<String>> {
        if let Ok(p) = std::env::var(&self.password_env) {
            if !p.is_empty() {
                return Ok(Some(p));
            }
        }
        if let Some(file) = &self.password_file {
            let path = shellexpand::tilde(file);
            let text = std::fs::read_to_string(path.as_ref())
                .with_context(|| format!("reading password file {path}"))?;
            return Ok(text.lines().next().map(str::to_string));
        }
        Ok(self.password.clone())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
