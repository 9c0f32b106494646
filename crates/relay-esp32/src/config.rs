//! NVS (Non-Volatile Storage) backed device record.
//!
//! The record is stored as one JSON blob. `set_raw` returns after the NVS
//! commit, which is the durability point [`ConfigStore::commit`] needs.

use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::warn;

use relay_core::config::MAX_RECORD_BYTES;
use relay_core::{ConfigError, ConfigStore, DeviceConfig};

const NAMESPACE: &str = "relay";
const RECORD_KEY: &str = "config";

pub struct NvsConfigStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsConfigStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl ConfigStore for NvsConfigStore {
    /// Anything that cannot be read back counts as blank storage, so
    /// `load()` rewrites the defaults instead of failing startup.
    fn read_record(&mut self) -> Result<Option<DeviceConfig>, ConfigError> {
        let mut buf = [0u8; MAX_RECORD_BYTES];
        let bytes = match self.nvs.get_raw(RECORD_KEY, &mut buf) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Cannot read stored record: {}", e);
                return Ok(None);
            }
        };

        match DeviceConfig::from_record_bytes(bytes) {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                warn!("Stored record is unreadable: {}", e);
                Ok(None)
            }
        }
    }

    /// Records that would not fit the read buffer are refused here.
    fn write_record(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
        let bytes = config.to_record_bytes()?;
        self.nvs
            .set_raw(RECORD_KEY, &bytes)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        Ok(())
    }
}
