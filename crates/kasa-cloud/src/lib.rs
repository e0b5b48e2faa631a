// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Client for the TP-Link Kasa cloud.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let session = kasa_cloud::Session::http();
//! session.authenticate("me@example.com", "secret").await?;
//! let lamp = session.find_device("Kitchen Lamp")?;
//! if !lamp.status().await?.is_on {
//!     lamp.turn_on().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod envelope;
pub mod error;
mod device;
mod mock;
mod session;
mod transport;

pub use device::{DeviceHandle, DeviceStatus};
pub use envelope::{AccountInfo, Command, DeviceRecord, DeviceRequest, SysInfo};
pub use error::{AuthError, CommandError, SessionError, TransportError};
pub use mock::{RecordedRequest, ScriptedTransport};
pub use session::{Session, DEFAULT_CLOUD_URL};
pub use transport::{HttpTransport, Transport};
