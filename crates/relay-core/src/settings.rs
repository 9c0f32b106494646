//! Node settings.
//!
//! Settings are fixed for the lifetime of the process, unlike
//! [`DeviceConfig`](crate::config::DeviceConfig) which the remote peer can
//! rewrite. Every field has a default so a partial JSON document is enough.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DeviceConfig;
use crate::framer::DEFAULT_MAX_PAYLOAD;

/// TCP port the gateway listens on.
pub const DEFAULT_TCP_PORT: u16 = 6000;

/// Network used for initial setup. Always joined with its own credential.
pub const PROVISIONING_SSID: &str = "relay-setup";
pub const PROVISIONING_PASSWORD: &str = "relaysetup";

pub const DEFAULT_PATTERN: &str = "-relay";
pub const DEFAULT_PASSWORD: &str = "relay1234";

/// A single literal network to join instead of scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedTarget {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

/// Process-wide node settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSettings {
    /// Gateway port for the control session.
    pub tcp_port: u16,

    /// Largest accepted packet payload.
    pub max_packet_size: usize,

    pub provisioning_ssid: String,
    pub provisioning_password: String,

    /// Written to storage when it holds no valid record.
    pub default_pattern: String,
    pub default_password: String,

    /// When false the stored record is ignored and the defaults are used.
    pub use_stored_config: bool,

    /// Join this network directly instead of scanning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_target: Option<FixedTarget>,

    /// Connect here instead of `gateway:tcp_port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_override: Option<SocketAddr>,

    pub scan_retry_delay_ms: u64,
    pub associate_poll_interval_ms: u64,
    pub session_retry_delay_ms: u64,
    pub tick_interval_ms: u64,

    /// Give up on an association after this many polls. Unlimited when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_associate_polls: Option<u32>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            tcp_port: DEFAULT_TCP_PORT,
            max_packet_size: DEFAULT_MAX_PAYLOAD,
            provisioning_ssid: PROVISIONING_SSID.to_string(),
            provisioning_password: PROVISIONING_PASSWORD.to_string(),
            default_pattern: DEFAULT_PATTERN.to_string(),
            default_password: DEFAULT_PASSWORD.to_string(),
            use_stored_config: true,
            fixed_target: None,
            server_override: None,
            scan_retry_delay_ms: 1000,
            associate_poll_interval_ms: 500,
            session_retry_delay_ms: 500,
            tick_interval_ms: 10,
            max_associate_polls: None,
        }
    }
}

impl NodeSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The record written to blank storage.
    pub fn default_config(&self) -> DeviceConfig {
        DeviceConfig::new(&self.default_pattern, &self.default_password)
    }

    pub fn scan_retry_delay(&self) -> Duration {
        Duration::from_millis(self.scan_retry_delay_ms)
    }

    pub fn associate_poll_interval(&self) -> Duration {
        Duration::from_millis(self.associate_poll_interval_ms)
    }

    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_millis(self.session_retry_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
