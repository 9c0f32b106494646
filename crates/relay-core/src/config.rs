//! Persisted device configuration.
//!
//! The device keeps a single small record in durable storage: the SSID suffix
//! used to pick a network and the password used to join it. This module
//! provides the record type and a storage trait that each platform implements:
//! - Linux: JSON file next to the binary
//! - ESP32: NVS (Non-Volatile Storage) blob
//!
//! Writes must be durable before [`ConfigStore::commit`] returns; the protocol
//! acknowledges a configuration change only after that.

use serde::{Deserialize, Serialize};

/// Marker stored alongside a valid record. Anything else means the storage
/// region has never been initialized.
pub const CONFIG_MARKER: u16 = 0x5AA5;

/// Storage capacity for the network pattern, in bytes.
pub const MAX_PATTERN_LEN: usize = 50;

/// Storage capacity for the network password, in bytes.
pub const MAX_PASSWORD_LEN: usize = 16;

/// Upper bound on a serialized record. Covers a pattern and password of
/// maximum length made entirely of characters that JSON escapes as `\uXXXX`.
pub const MAX_RECORD_BYTES: usize = 512;

/// Errors that can occur during configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the record.
    ReadError(String),
    /// Failed to write the record.
    WriteError(String),
    /// Stored data could not be decoded.
    InvalidData(String),
    /// A field does not fit its storage slot.
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    /// Storage is not available.
    StorageUnavailable(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Read error: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Write error: {}", msg),
            ConfigError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            ConfigError::TooLong { field, len, max } => {
                write!(f, "{} is {} bytes, at most {} fit", field, len, max)
            }
            ConfigError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// The persisted device record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Equals [`CONFIG_MARKER`] once the record has been initialized.
    pub marker: u16,

    /// SSID suffix used by the network selector.
    pub network_pattern: String,

    /// Password for networks matched by `network_pattern`.
    pub password: String,
}

impl DeviceConfig {
    /// Create a valid record from the given values.
    pub fn new(network_pattern: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            marker: CONFIG_MARKER,
            network_pattern: network_pattern.into(),
            password: password.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.marker == CONFIG_MARKER
    }

    /// Copy of this record with a new network pattern, if it fits.
    pub fn with_network_pattern(&self, pattern: &str) -> Result<Self, ConfigError> {
        check_len("network pattern", pattern, MAX_PATTERN_LEN)?;
        Ok(Self {
            network_pattern: pattern.to_string(),
            ..self.clone()
        })
    }

    /// Copy of this record with a new password, if it fits.
    pub fn with_password(&self, password: &str) -> Result<Self, ConfigError> {
        check_len("password", password, MAX_PASSWORD_LEN)?;
        Ok(Self {
            password: password.to_string(),
            ..self.clone()
        })
    }

    /// Serialized form used by byte-oriented stores.
    pub fn to_record_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        let bytes = serde_json::to_vec(self).map_err(|e| ConfigError::InvalidData(e.to_string()))?;
        if bytes.len() > MAX_RECORD_BYTES {
            return Err(ConfigError::TooLong {
                field: "record",
                len: bytes.len(),
                max: MAX_RECORD_BYTES,
            });
        }
        Ok(bytes)
    }

    pub fn from_record_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        serde_json::from_slice(bytes).map_err(|e| ConfigError::InvalidData(e.to_string()))
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ConfigError> {
    if value.len() > max {
        return Err(ConfigError::TooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

/// Durable storage for the [`DeviceConfig`] record.
///
/// Implementations only move raw records in and out. Initialization of a
/// blank or foreign region is handled by the provided [`ConfigStore::load`].
pub trait ConfigStore {
    /// Read the stored record. `Ok(None)` when nothing has been written yet.
    fn read_record(&mut self) -> Result<Option<DeviceConfig>, ConfigError>;

    /// Write the record. Must be durable when this returns.
    fn write_record(&mut self, config: &DeviceConfig) -> Result<(), ConfigError>;

    /// Load the record, initializing storage with `defaults` when the marker
    /// is missing or does not match.
    fn load(&mut self, defaults: &DeviceConfig) -> Result<DeviceConfig, ConfigError> {
        match self.read_record()? {
            Some(config) if config.is_valid() => Ok(config),
            _ => {
                let config = DeviceConfig {
                    marker: CONFIG_MARKER,
                    ..defaults.clone()
                };
                self.commit(&config)?;
                Ok(config)
            }
        }
    }

    /// Validate and durably write the record.
    fn commit(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
        check_len("network pattern", &config.network_pattern, MAX_PATTERN_LEN)?;
        check_len("password", &config.password, MAX_PASSWORD_LEN)?;
        self.write_record(config)
    }
}

/// Volatile store, used by tests and by hosts without persistent storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    record: Option<DeviceConfig>,
    commits: usize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already written record.
    pub fn with_record(record: DeviceConfig) -> Self {
        Self {
            record: Some(record),
            commits: 0,
        }
    }

    pub fn record(&self) -> Option<&DeviceConfig> {
        self.record.as_ref()
    }

    /// Number of successful writes.
    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl ConfigStore for MemoryConfigStore {
    fn read_record(&mut self) -> Result<Option<DeviceConfig>, ConfigError> {
        Ok(self.record.clone())
    }

    fn write_record(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
        self.record = Some(config.clone());
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn defaults() -> DeviceConfig {
        DeviceConfig::new("-relay", "relay1234")
    }

    #[test]
    fn test_load_initializes_blank_storage() {
        let mut store = MemoryConfigStore::new();

        let loaded = store.load(&defaults()).unwrap();

        assert_eq!(loaded, defaults());
        assert_eq!(store.record(), Some(&defaults()));
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn test_load_replaces_record_with_foreign_marker() {
        let foreign = DeviceConfig {
            marker: 0xFFFF,
            network_pattern: "garbage".to_string(),
            password: "garbage".to_string(),
        };
        let mut store = MemoryConfigStore::with_record(foreign);

        let loaded = store.load(&defaults()).unwrap();

        assert_eq!(loaded, defaults());
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn test_load_keeps_valid_record() {
        let stored = DeviceConfig::new("-5G", "secret");
        let mut store = MemoryConfigStore::with_record(stored.clone());

        let loaded = store.load(&defaults()).unwrap();

        assert_eq!(loaded, stored);
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn test_pattern_length_bound() {
        let config = defaults();
        assert!(config.with_network_pattern(&"a".repeat(MAX_PATTERN_LEN)).is_ok());

        let err = config
            .with_network_pattern(&"a".repeat(MAX_PATTERN_LEN + 1))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooLong { len: 51, max: 50, .. }));
    }

    #[test]
    fn test_password_length_bound() {
        let config = defaults();
        let updated = config.with_password("0123456789abcdef").unwrap();
        assert_eq!(updated.password, "0123456789abcdef");
        assert_eq!(updated.network_pattern, config.network_pattern);

        assert!(config.with_password("0123456789abcdefg").is_err());
    }

    #[test]
    fn test_commit_rejects_oversized_record() {
        let mut store = MemoryConfigStore::new();
        let config = DeviceConfig::new("-relay", "x".repeat(MAX_PASSWORD_LEN + 1));

        assert!(store.commit(&config).is_err());
        assert_eq!(store.record(), None);
    }

    #[test]
    fn test_record_serialization() {
        let json = serde_json::to_string(&defaults()).unwrap();
        assert!(json.contains("\"marker\":23205"));
        assert!(json.contains("\"networkPattern\":\"-relay\""));
    }

    #[test]
    fn test_worst_case_record_fits_record_bytes() {
        let config = defaults()
            .with_network_pattern(&"\u{1}".repeat(MAX_PATTERN_LEN))
            .unwrap()
            .with_password(&"\u{1}".repeat(MAX_PASSWORD_LEN))
            .unwrap();

        let bytes = config.to_record_bytes().unwrap();

        assert!(bytes.len() > 256);
        assert!(bytes.len() <= MAX_RECORD_BYTES);
        assert_eq!(DeviceConfig::from_record_bytes(&bytes).unwrap(), config);
    }

    #[test]
    fn test_record_bytes_rejects_oversized_record() {
        let config = DeviceConfig::new("\u{1}".repeat(2 * MAX_PATTERN_LEN), "pw");

        let err = config.to_record_bytes().unwrap_err();
        assert!(matches!(err, ConfigError::TooLong { field: "record", max: MAX_RECORD_BYTES, .. }));
    }

    #[test]
    fn test_record_bytes_rejects_garbage() {
        assert!(matches!(
            DeviceConfig::from_record_bytes(b"\xff\x00"),
            Err(ConfigError::InvalidData(_))
        ));
    }
}
