//! State-change notifications
//!
//! The one channel by which the hosting layer learns about the device. It
//! must subscribe instead of polling client internals.

use crate::protocol::DeviceSnapshot;

/// Notification emitted by the client event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// Binding completed; commands and polls are live
    Connected(DeviceSnapshot),
    /// A status poll answered with fresh property values
    Status(DeviceSnapshot),
    /// A command was acknowledged and its values merged
    Update(DeviceSnapshot),
    /// A datagram was dropped or a protocol hiccup occurred; state unchanged
    Error { detail: String },
    /// The device stopped answering; rediscovery is running
    Disconnected,
}

impl Event {
    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Status(_) => "status",
            Self::Update(_) => "update",
            Self::Error { .. } => "error",
            Self::Disconnected => "disconnected",
        }
    }
}
