// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Request envelopes and reply decoding for the Kasa cloud JSON protocol.
//!
//! Outbound shapes:
//!
//! ```text
//! login        {"method":"login","params":{"appType","cloudUserName","cloudPassword","terminalUUID"}}
//! device list  {"method":"getDeviceList"}
//! passthrough  {"method":"passthrough","params":{"deviceId","requestData":{"system":{<name>:<params>}}}}
//! ```
//!
//! Every reply carries a top-level `error_code` (0 = success) and, on success,
//! a `result` object whose shape depends on the method.

use md5::{Digest, Md5};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AuthError, CommandError};

/// Client identifier sent as `appType` on login.
pub const DEFAULT_APP_TYPE: &str = "Kasa_Android";

// ── Requests ──────────────────────────────────────────────────────────────────

/// A command addressed to a single device through the passthrough relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    GetSysInfo,
    SetRelayState { state: bool },
}

impl DeviceRequest {
    /// Key under `requestData.system` on the wire.
    pub fn method_name(&self) -> &'static str {
        match self {
            DeviceRequest::GetSysInfo => "get_sysinfo",
            DeviceRequest::SetRelayState { .. } => "set_relay_state",
        }
    }

    fn params(&self) -> Value {
        match self {
            DeviceRequest::GetSysInfo => json!({}),
            DeviceRequest::SetRelayState { state } => json!({ "state": state }),
        }
    }
}

/// One outbound cloud call.
#[derive(Clone, PartialEq)]
pub enum Command {
    Login {
        app_type: String,
        email: String,
        password: String,
        terminal_uuid: Uuid,
    },
    ListDevices,
    Passthrough {
        device_id: String,
        request: DeviceRequest,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Login { app_type, email, terminal_uuid, .. } => f
                .debug_struct("Login")
                .field("app_type", app_type)
                .field("email", email)
                .field("password", &"<redacted>")
                .field("terminal_uuid", terminal_uuid)
                .finish(),
            Command::ListDevices => f.write_str("ListDevices"),
            Command::Passthrough { device_id, request } => f
                .debug_struct("Passthrough")
                .field("device_id", device_id)
                .field("request", request)
                .finish(),
        }
    }
}

impl Command {
    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::login_as(DEFAULT_APP_TYPE, email, password)
    }

    pub fn login_as(
        app_type: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let email = email.into();
        let terminal_uuid = terminal_uuid(&email);
        Command::Login {
            app_type: app_type.into(),
            email,
            password: password.into(),
            terminal_uuid,
        }
    }

    pub fn passthrough(device_id: impl Into<String>, request: DeviceRequest) -> Self {
        Command::Passthrough {
            device_id: device_id.into(),
            request,
        }
    }

    /// Value of the top-level `method` field.
    pub fn method(&self) -> &'static str {
        match self {
            Command::Login { .. } => "login",
            Command::ListDevices => "getDeviceList",
            Command::Passthrough { .. } => "passthrough",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Command::Login { app_type, email, password, terminal_uuid } => json!({
                "method": self.method(),
                "params": {
                    "appType": app_type,
                    "cloudUserName": email,
                    "cloudPassword": password,
                    "terminalUUID": terminal_uuid.to_string(),
                }
            }),
            Command::ListDevices => json!({ "method": self.method() }),
            Command::Passthrough { device_id, request } => {
                let mut system = serde_json::Map::new();
                system.insert(request.method_name().to_string(), request.params());
                json!({
                    "method": self.method(),
                    "params": {
                        "deviceId": device_id,
                        "requestData": { "system": system },
                    }
                })
            }
        }
    }
}

/// Name-based (MD5, version 3) UUID of the raw email bytes.
///
/// Stable across runs so repeated logins reuse one terminal identity.
pub fn terminal_uuid(email: &str) -> Uuid {
    let digest = Md5::digest(email.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

// ── Replies ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Reply<T> {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    msg: Option<String>,
    result: Option<T>,
}

impl<T> Reply<T> {
    fn message(&self) -> String {
        self.msg.clone().unwrap_or_else(|| "no message".into())
    }
}

/// The cloud returns `accountId` as a string on current servers and as a
/// number on older ones.
fn string_or_number<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Descriptive metadata: a value of the wrong JSON type reads as absent.
fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(d)?.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default, deserialize_with = "string_or_number")]
    pub account_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub reg_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub risk_detected: Option<i64>,
}

#[derive(Deserialize)]
struct TokenResult {
    token: Option<String>,
    #[serde(flatten)]
    account: AccountInfo,
}

/// Decoded login reply.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginReply {
    pub token: String,
    pub account: AccountInfo,
}

pub fn decode_login(v: Value) -> Result<LoginReply, AuthError> {
    let reply: Reply<TokenResult> =
        serde_json::from_value(v).map_err(|e| AuthError::Malformed(e.to_string()))?;
    if reply.error_code != 0 {
        let msg = reply.message();
        warn!(code = reply.error_code, msg = %msg, "cloud rejected login");
        return Err(AuthError::LoginRejected {
            code: reply.error_code,
            msg,
        });
    }
    let result = reply.result.ok_or(AuthError::MissingToken)?;
    match result.token {
        Some(token) if !token.is_empty() => Ok(LoginReply {
            token,
            account: result.account,
        }),
        _ => Err(AuthError::MissingToken),
    }
}

/// One entry of the account's device directory.
///
/// `deviceId` and `appServerUrl` are required; everything else is metadata
/// and reads as absent when missing or mistyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub alias: String,
    /// Relay endpoint for passthrough commands.
    pub app_server_url: String,
    #[serde(default, deserialize_with = "lenient")]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_region: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_hw_ver: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_mac: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub fw_ver: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub fw_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub hw_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub oem_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_same_region: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceListResult {
    device_list: Vec<Value>,
}

/// Decode the directory, keeping cloud order.  Entries that cannot be
/// addressed (no `deviceId` or `appServerUrl`) are skipped with a warning
/// instead of failing the whole account.
pub fn decode_device_list(v: Value) -> Result<Vec<DeviceRecord>, AuthError> {
    let reply: Reply<DeviceListResult> =
        serde_json::from_value(v).map_err(|e| AuthError::Malformed(e.to_string()))?;
    if reply.error_code != 0 {
        let msg = reply.message();
        warn!(code = reply.error_code, msg = %msg, "cloud rejected device listing");
        return Err(AuthError::ListingRejected {
            code: reply.error_code,
            msg,
        });
    }
    let entries = reply
        .result
        .map(|r| r.device_list)
        .ok_or_else(|| AuthError::Malformed("missing `result.deviceList`".into()))?;

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let device_id = entry
            .get("deviceId")
            .and_then(Value::as_str)
            .map(str::to_string);
        match serde_json::from_value::<DeviceRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                index,
                device_id = device_id.as_deref().unwrap_or("-"),
                error = %e,
                "skipping unaddressable device entry"
            ),
        }
    }
    Ok(records)
}

/// `system.get_sysinfo` as reported by a plug. Every field is optional:
/// firmware revisions and models disagree on what they include, and a field
/// of an unexpected type reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SysInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub relay_state: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub err_code: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub alias: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub dev_name: Option<String>,
    #[serde(rename = "deviceId", default, deserialize_with = "lenient")]
    pub device_id: Option<String>,
    #[serde(rename = "hwId", default, deserialize_with = "lenient")]
    pub hw_id: Option<String>,
    #[serde(rename = "oemId", default, deserialize_with = "lenient")]
    pub oem_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub hw_ver: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub sw_ver: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub rssi: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub on_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub led_off: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub updating: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub active_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub feature: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

impl SysInfo {
    pub fn is_on(&self) -> Option<bool> {
        self.relay_state.map(|s| s == 1)
    }
}

/// `system.set_relay_state` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayAck {
    #[serde(default, deserialize_with = "lenient")]
    pub err_code: Option<i64>,
}

/// Decoded passthrough reply. `system` keeps the untouched device payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PassthroughReply {
    pub sysinfo: Option<SysInfo>,
    pub relay_ack: Option<RelayAck>,
    pub system: Value,
}

impl PassthroughReply {
    pub fn relay_state(&self) -> Option<bool> {
        self.sysinfo.as_ref().and_then(SysInfo::is_on)
    }
}

pub fn decode_passthrough(v: Value) -> Result<PassthroughReply, CommandError> {
    let reply: Reply<Value> =
        serde_json::from_value(v).map_err(|e| CommandError::Malformed(e.to_string()))?;
    if reply.error_code != 0 {
        let msg = reply.message();
        warn!(code = reply.error_code, msg = %msg, "cloud rejected passthrough");
        return Err(CommandError::Cloud {
            code: reply.error_code,
            msg,
        });
    }
    let data = reply
        .result
        .and_then(|mut r| r.get_mut("responseData").map(Value::take))
        .ok_or(CommandError::MissingField("responseData"))?;

    // Some relays return responseData as a JSON-encoded string.
    let data = match data {
        Value::String(s) => {
            serde_json::from_str(&s).map_err(|e| CommandError::Malformed(e.to_string()))?
        }
        other => other,
    };

    let system = data.get("system").cloned().unwrap_or(Value::Null);
    let sysinfo = system
        .get("get_sysinfo")
        .map(|s| serde_json::from_value::<SysInfo>(s.clone()))
        .transpose()
        .map_err(|e| CommandError::Malformed(e.to_string()))?;
    let relay_ack = system
        .get("set_relay_state")
        .map(|s| serde_json::from_value::<RelayAck>(s.clone()))
        .transpose()
        .map_err(|e| CommandError::Malformed(e.to_string()))?;

    Ok(PassthroughReply {
        sysinfo,
        relay_ack,
        system,
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
