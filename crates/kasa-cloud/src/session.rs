// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Account session: login, device directory, alias lookup.
//!
//! A [`Session`] starts unauthenticated.  [`Session::authenticate`] performs
//! `login` and then `getDeviceList` with the fresh token; only when both
//! succeed is the token committed together with the directory.  There is no
//! state in which one exists without the other, and no way back to
//! unauthenticated.

use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    device::DeviceHandle,
    envelope::{
        decode_device_list, decode_login, AccountInfo, Command, DeviceRecord, DEFAULT_APP_TYPE,
    },
    error::{AuthError, SessionError},
    transport::{HttpTransport, Transport},
};

/// Account endpoint used for login and device listing.
pub const DEFAULT_CLOUD_URL: &str = "https://wap.tplinkcloud.com/";

/// Token and directory, committed as one value.
#[derive(Debug)]
struct Authenticated {
    token: String,
    account: AccountInfo,
    devices: Vec<DeviceRecord>,
}

pub struct Session {
    cloud_url: String,
    app_type: String,
    transport: Box<dyn Transport>,
    auth: OnceCell<Authenticated>,
}

impl Session {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            cloud_url: DEFAULT_CLOUD_URL.to_string(),
            app_type: DEFAULT_APP_TYPE.to_string(),
            transport: Box::new(transport),
            auth: OnceCell::new(),
        }
    }

    /// Session over the default HTTP transport.
    pub fn http() -> Self {
        Self::new(HttpTransport::new())
    }

    pub fn with_cloud_url(mut self, url: impl Into<String>) -> Self {
        self.cloud_url = url.into();
        self
    }

    pub fn with_app_type(mut self, app_type: impl Into<String>) -> Self {
        self.app_type = app_type.into();
        self
    }

    pub fn cloud_url(&self) -> &str {
        &self.cloud_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.initialized()
    }

    /// Log in and load the device directory.
    ///
    /// A no-op once the session is authenticated, whatever credentials are
    /// passed.  Concurrent callers share a single in-flight attempt; if that
    /// attempt fails nothing is committed and a later call tries again.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if self.auth.initialized() {
            debug!("session already authenticated");
            return Ok(());
        }
        self.auth
            .get_or_try_init(|| self.login_and_list(email, password))
            .await?;
        Ok(())
    }

    async fn login_and_list(&self, email: &str, password: &str) -> Result<Authenticated, AuthError> {
        debug!(%email, url = %self.cloud_url, "logging in");
        let login = Command::login_as(self.app_type.as_str(), email, password);
        let reply = self
            .transport
            .post(&self.cloud_url, None, login.to_json())
            .await?;
        let login = decode_login(reply)?;

        debug!("listing devices");
        let reply = self
            .transport
            .post(&self.cloud_url, Some(&login.token), Command::ListDevices.to_json())
            .await?;
        let devices = decode_device_list(reply)?;
        debug!(count = devices.len(), "device directory loaded");

        Ok(Authenticated {
            token: login.token,
            account: login.account,
            devices,
        })
    }

    fn authenticated(&self) -> Result<&Authenticated, SessionError> {
        self.auth.get().ok_or(SessionError::AuthRequired)
    }

    pub fn account(&self) -> Result<&AccountInfo, SessionError> {
        Ok(&self.authenticated()?.account)
    }

    /// The device directory in the order the cloud returned it.
    pub fn list_devices(&self) -> Result<&[DeviceRecord], SessionError> {
        Ok(&self.authenticated()?.devices)
    }

    /// A handle for every device in the directory.
    pub fn devices(&self) -> Result<Vec<DeviceHandle<'_>>, SessionError> {
        let auth = self.authenticated()?;
        Ok(auth
            .devices
            .iter()
            .map(|d| DeviceHandle::new(d, &auth.token, self.transport.as_ref()))
            .collect())
    }

    /// First device whose alias equals `alias` exactly.
    pub fn find_device(&self, alias: &str) -> Result<DeviceHandle<'_>, SessionError> {
        let auth = self.authenticated()?;
        auth.devices
            .iter()
            .find(|d| d.alias == alias)
            .map(|d| DeviceHandle::new(d, &auth.token, self.transport.as_ref()))
            .ok_or_else(|| SessionError::NotFound(alias.to_string()))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::{error::TransportError, mock::ScriptedTransport};

    fn login_ok(token: &str) -> Value {
        json!({ "error_code": 0, "result": { "email": "a@x.com", "token": token } })
    }

    fn device(id: &str, alias: &str, url: &str) -> Value {
        json!({ "deviceId": id, "alias": alias, "appServerUrl": url })
    }

    fn list_ok(devices: Vec<Value>) -> Value {
        json!({ "error_code": 0, "result": { "deviceList": devices } })
    }

    #[tokio::test]
    async fn unauthenticated_session_requires_auth() {
        let s = Session::new(ScriptedTransport::default());
        assert!(!s.is_authenticated());
        assert_eq!(s.list_devices().unwrap_err(), SessionError::AuthRequired);
        assert_eq!(s.find_device("x").unwrap_err(), SessionError::AuthRequired);
        assert!(s.devices().is_err());
        assert!(s.account().is_err());
    }

    #[tokio::test]
    async fn authenticate_sends_login_then_listing_with_token() {
        let t = ScriptedTransport::replies(vec![login_ok("tok-1"), list_ok(vec![])]);
        let s = Session::new(t.clone()).with_cloud_url("http://cloud.test/");
        s.authenticate("a@x.com", "pw").await.unwrap();

        let seen = t.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].url, "http://cloud.test/");
        assert_eq!(seen[0].token, None);
        assert_eq!(seen[0].body["method"], "login");
        assert_eq!(seen[1].token.as_deref(), Some("tok-1"));
        assert_eq!(seen[1].body, json!({ "method": "getDeviceList" }));
        assert_eq!(s.list_devices().unwrap().len(), 0);
        assert_eq!(s.account().unwrap().email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn authenticate_twice_is_a_no_op() {
        let t = ScriptedTransport::replies(vec![login_ok("tok-1"), list_ok(vec![])]);
        let s = Session::new(t.clone());
        s.authenticate("a@x.com", "pw").await.unwrap();
        s.authenticate("a@x.com", "pw").await.unwrap();
        s.authenticate("other@x.com", "different").await.unwrap();
        assert_eq!(t.requests().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_authenticate_shares_one_attempt() {
        let t = ScriptedTransport::replies(vec![login_ok("tok-1"), list_ok(vec![])]);
        let s = Session::new(t.clone());
        let (a, b) = tokio::join!(s.authenticate("a@x.com", "pw"), s.authenticate("a@x.com", "pw"));
        a.unwrap();
        b.unwrap();
        assert_eq!(t.requests().len(), 2);
    }

    #[tokio::test]
    async fn rejected_login_skips_listing() {
        let t = ScriptedTransport::replies(vec![
            json!({ "error_code": -20601, "msg": "Incorrect email or password" }),
        ]);
        let s = Session::new(t.clone());
        let err = s.authenticate("a@x.com", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::LoginRejected { code: -20601, .. }));
        assert_eq!(t.requests().len(), 1);
        assert!(!s.is_authenticated());
    }

    #[tokio::test]
    async fn failed_listing_does_not_commit_token() {
        let t = ScriptedTransport::new(vec![
            Ok(login_ok("tok-1")),
            Err(TransportError::Request("connection reset".into())),
        ]);
        let s = Session::new(t.clone());
        let err = s.authenticate("a@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
        assert!(!s.is_authenticated());
        assert_eq!(s.list_devices().unwrap_err(), SessionError::AuthRequired);
        assert_eq!(s.find_device("Kitchen Lamp").unwrap_err(), SessionError::AuthRequired);
    }

    #[tokio::test]
    async fn retry_after_failed_attempt_can_succeed() {
        let t = ScriptedTransport::replies(vec![
            login_ok("tok-1"),
            json!({ "error_code": -20651, "msg": "Token expired" }),
            login_ok("tok-2"),
            list_ok(vec![device("d1", "Desk", "http://relay.test")]),
        ]);
        let s = Session::new(t.clone());
        assert!(s.authenticate("a@x.com", "pw").await.is_err());
        s.authenticate("a@x.com", "pw").await.unwrap();
        assert_eq!(t.requests()[3].token.as_deref(), Some("tok-2"));
        assert_eq!(s.list_devices().unwrap()[0].alias, "Desk");
    }

    #[tokio::test]
    async fn unaddressable_entry_does_not_fail_authenticate() {
        let t = ScriptedTransport::replies(vec![
            login_ok("tok-1"),
            list_ok(vec![
                device("d1", "Kitchen Lamp", "http://relay-a.test"),
                json!({ "deviceId": "d2", "alias": "Hub child" }),
            ]),
        ]);
        let s = Session::new(t);
        s.authenticate("a@x.com", "pw").await.unwrap();

        assert_eq!(s.list_devices().unwrap().len(), 1);
        assert_eq!(s.find_device("Kitchen Lamp").unwrap().device_id(), "d1");
        assert_eq!(
            s.find_device("Hub child").unwrap_err(),
            SessionError::NotFound("Hub child".into())
        );
    }

    #[tokio::test]
    async fn find_device_by_alias() {
        let t = ScriptedTransport::replies(vec![
            login_ok("tok-1"),
            list_ok(vec![
                device("d1", "Kitchen Lamp", "http://relay-a.test"),
                device("d2", "Desk", "http://relay-b.test"),
                device("d3", "Kitchen Lamp", "http://relay-c.test"),
            ]),
        ]);
        let s = Session::new(t);
        s.authenticate("a@x.com", "pw").await.unwrap();

        let lamp = s.find_device("Kitchen Lamp").unwrap();
        assert_eq!(lamp.device_id(), "d1");
        assert_eq!(lamp.endpoint(), "http://relay-a.test");
        assert_eq!(
            s.find_device("Nonexistent").unwrap_err(),
            SessionError::NotFound("Nonexistent".into())
        );
        assert!(s.find_device("kitchen lamp").is_err());
        assert_eq!(s.devices().unwrap().len(), 3);
    }
}
