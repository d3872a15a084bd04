//! Client configuration
//!
//! Every field has an explicit default; a TOML file (for the CLI) or the
//! hosting layer can override any of them. Durations are carried as
//! milliseconds so the file format stays flat.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COMMAND_PORT, DEFAULT_MAX_CONNECT_ATTEMPTS, DEFAULT_MAX_MISSED_POLLS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_INTERVAL_MS, DEFAULT_UPDATE_INTERVAL_MS,
};
use crate::error::{AcError, Result};

/// Configuration for one device client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device IP address on the local network
    pub host: String,
    /// UDP port the device listens on
    pub command_port: u16,
    /// Local port override; derived from the device address when unset,
    /// 0 for an ephemeral port
    pub local_port: Option<u16>,
    /// Interval between status polls (milliseconds)
    pub update_interval_ms: u64,
    /// Interval between discovery retries (milliseconds)
    pub retry_interval_ms: u64,
    /// Deadline for one request/response exchange (milliseconds)
    pub request_timeout_ms: u64,
    /// Discovery rounds before `connect` gives up
    pub max_connect_attempts: u32,
    /// Consecutive unanswered polls before the binding is dropped
    pub max_missed_polls: u32,
    /// When set, room-temperature readings below this raw value are
    /// discarded as sensor noise
    pub min_valid_temp: Option<i64>,
    /// Debug-level output
    pub verbose: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            command_port: DEFAULT_COMMAND_PORT,
            local_port: None,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_connect_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            max_missed_polls: DEFAULT_MAX_MISSED_POLLS,
            min_valid_temp: None,
            verbose: false,
        }
    }
}

/// File wrapper: the CLI config lives under a `[device]` table.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    device: DeviceConfig,
}

impl DeviceConfig {
    /// Load from a TOML file with a `[device]` table.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AcError::Config {
            field: "file",
            reason: format!("{}: {}", path.display(), e),
        })?;
        let parsed: ConfigFile = toml::from_str(&text).map_err(|e| AcError::Config {
            field: "file",
            reason: e.to_string(),
        })?;
        Ok(parsed.device)
    }

    /// Check the config and return the parsed device address.
    pub fn validate(&self) -> Result<IpAddr> {
        let host: IpAddr = self.host.parse().map_err(|_| AcError::Config {
            field: "host",
            reason: format!("not an IP address: {:?}", self.host),
        })?;
        if self.update_interval_ms == 0 {
            return Err(AcError::Config {
                field: "update_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.retry_interval_ms == 0 {
            return Err(AcError::Config {
                field: "retry_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(AcError::Config {
                field: "request_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_connect_attempts == 0 {
            return Err(AcError::Config {
                field: "max_connect_attempts",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(host)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_protocol_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.command_port, 7000);
        assert_eq!(config.update_interval(), Duration::from_secs(10));
        assert_eq!(config.retry_interval(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.max_connect_attempts, 3);
        assert_eq!(config.max_missed_polls, 3);
        assert_eq!(config.min_valid_temp, None);
    }

    #[test]
    fn test_toml_partial_override() {
        let parsed: ConfigFile = toml::from_str(
            r#"
[device]
host = "192.168.1.50"
update_interval_ms = 5000
"#,
        )
        .unwrap();
        assert_eq!(parsed.device.host, "192.168.1.50");
        assert_eq!(parsed.device.update_interval_ms, 5000);
        // Untouched fields keep their defaults
        assert_eq!(parsed.device.command_port, 7000);
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let config = DeviceConfig {
            host: "not-an-ip".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AcError::Config { field: "host", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let config = DeviceConfig {
            host: "192.168.1.50".into(),
            update_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_good_config() {
        let config = DeviceConfig {
            host: "192.168.1.50".into(),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap(), "192.168.1.50".parse::<IpAddr>().unwrap());
    }
}
