//! Centralized error types for the client
//!
//! All client errors are represented by the `AcError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, AcError>`.

use std::fmt;
use std::time::Duration;

/// All client errors
#[derive(Debug)]
pub enum AcError {
    // === Transport ===
    /// Failed to bind the local UDP socket
    SocketBind { port: u16, source: std::io::Error },

    // === Wire protocol ===
    /// Malformed or undecryptable payload
    Codec { detail: String },

    // === Requests ===
    /// No response within the request deadline
    Timeout { after: Duration },
    /// A request was issued while another one was still in flight
    Busy,
    /// A request was issued before the device was bound
    NotBound,

    // === Lifecycle ===
    /// Discovery/binding exhausted its retry budget
    Bind { attempts: u32 },
    /// The client was shut down or its event loop is gone
    Closed,

    // === Configuration ===
    /// Invalid config value
    Config { field: &'static str, reason: String },
}

impl std::error::Error for AcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SocketBind { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for AcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketBind { port, .. } => write!(f, "Cannot bind UDP port {}", port),
            Self::Codec { detail } => write!(f, "Bad payload: {}", detail),
            Self::Timeout { after } => {
                write!(f, "No response from device within {:?}", after)
            }
            Self::Busy => write!(f, "Another request is already in flight"),
            Self::NotBound => write!(f, "Not bound to a device"),
            Self::Bind { attempts } => {
                write!(f, "Device discovery failed after {} attempts", attempts)
            }
            Self::Closed => write!(f, "Client is shut down"),
            Self::Config { field, reason } => write!(f, "Invalid {}: {}", field, reason),
        }
    }
}

/// Alias for Result with AcError
pub type Result<T> = std::result::Result<T, AcError>;
