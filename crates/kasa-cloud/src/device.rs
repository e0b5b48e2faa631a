// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;
use tracing::debug;

use crate::{
    envelope::{decode_passthrough, Command, DeviceRecord, DeviceRequest, PassthroughReply, SysInfo},
    error::CommandError,
    transport::Transport,
};

/// Power state plus whatever else the plug reported alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub is_on: bool,
    pub sysinfo: SysInfo,
}

/// Command dispatcher for one device, borrowed from an authenticated
/// [`Session`](crate::Session).
///
/// Handles are cheap views over the session's directory entry and token.
/// They are not cached; two handles for the same device are interchangeable.
#[derive(Clone, Copy)]
pub struct DeviceHandle<'a> {
    record: &'a DeviceRecord,
    token: &'a str,
    transport: &'a dyn Transport,
}

impl std::fmt::Debug for DeviceHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("alias", &self.record.alias)
            .field("device_id", &self.record.device_id)
            .field("endpoint", &self.record.app_server_url)
            .finish()
    }
}

impl<'a> DeviceHandle<'a> {
    pub(crate) fn new(record: &'a DeviceRecord, token: &'a str, transport: &'a dyn Transport) -> Self {
        Self { record, token, transport }
    }

    pub fn alias(&self) -> &'a str {
        &self.record.alias
    }

    pub fn device_id(&self) -> &'a str {
        &self.record.device_id
    }

    /// Relay URL passthrough commands are posted to.
    pub fn endpoint(&self) -> &'a str {
        &self.record.app_server_url
    }

    pub fn record(&self) -> &'a DeviceRecord {
        self.record
    }

    async fn send(&self, request: DeviceRequest) -> Result<PassthroughReply, CommandError> {
        debug!(alias = %self.record.alias, method = request.method_name(), "passthrough");
        let body = Command::passthrough(self.record.device_id.as_str(), request).to_json();
        let reply = self
            .transport
            .post(&self.record.app_server_url, Some(self.token), body)
            .await?;
        decode_passthrough(reply)
    }

    /// Raw `get_sysinfo` payload.  Fields the firmware omits stay `None`.
    pub async fn sysinfo(&self) -> Result<SysInfo, CommandError> {
        let info = self
            .send(DeviceRequest::GetSysInfo)
            .await?
            .sysinfo
            .ok_or(CommandError::MissingField("get_sysinfo"))?;
        match info.err_code {
            Some(code) if code != 0 => Err(CommandError::Device { code }),
            _ => Ok(info),
        }
    }

    /// Current relay state.  Fails with [`CommandError::MissingField`] when
    /// the reply has no `relay_state`; no default is substituted.
    pub async fn status(&self) -> Result<DeviceStatus, CommandError> {
        let sysinfo = self.sysinfo().await?;
        let is_on = sysinfo
            .is_on()
            .ok_or(CommandError::MissingField("relay_state"))?;
        Ok(DeviceStatus { is_on, sysinfo })
    }

    pub async fn set_power(&self, on: bool) -> Result<(), CommandError> {
        let reply = self.send(DeviceRequest::SetRelayState { state: on }).await?;
        match reply.relay_ack.and_then(|a| a.err_code) {
            Some(code) if code != 0 => Err(CommandError::Device { code }),
            _ => Ok(()),
        }
    }

    pub async fn turn_on(&self) -> Result<(), CommandError> {
        self.set_power(true).await
    }

    pub async fn turn_off(&self) -> Result<(), CommandError> {
        self.set_power(false).await
    }

    /// Flip the relay and return the new state.
    ///
    /// This is a read followed by a write, two separate round trips.  The
    /// cloud offers no compare-and-set, so a concurrent toggle or a change
    /// made elsewhere between the two calls can leave the plug in either
    /// state.  Callers that need exclusivity must serialise toggles per
    /// device themselves.
    pub async fn toggle(&self) -> Result<bool, CommandError> {
        let target = !self.status().await?.is_on;
        self.set_power(target).await?;
        Ok(target)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
