//! LAN control client for Sinclair (Gree-protocol) air conditioners
//!
//! Talks to one unit over UDP: discovers it with a scan probe, exchanges a
//! session key in an encrypted bind handshake, then polls status and pushes
//! commands. The hosting layer (a home-automation integration, the bundled
//! `sacctl` CLI, anything else) drives [`DeviceClient`] and subscribes to
//! [`Event`] notifications; everything below that facade is protocol
//! plumbing.
//!
//! ```no_run
//! use sinclair_ac::{DeviceClient, DeviceConfig, StatePatch};
//!
//! # async fn demo() -> sinclair_ac::Result<()> {
//! let config = DeviceConfig {
//!     host: "192.168.1.50".into(),
//!     ..Default::default()
//! };
//! let client = DeviceClient::connect(config).await?;
//! let patch = StatePatch {
//!     power: Some(true),
//!     target_temp: Some(24),
//!     ..Default::default()
//! };
//! client.set_state(patch).await?;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{DeviceClient, Event};
pub use config::DeviceConfig;
pub use error::{AcError, Result};
pub use protocol::{DeviceSnapshot, FanSpeed, Mode, StatePatch, VerticalSwing};
