//! Desktop stand-ins for the node's hardware.
//!
//! There is no radio on a desktop, so [`SimulatedWifi`] pretends to be in
//! range of exactly one network and hands out loopback as the gateway. The
//! device record lives in a JSON file, and the relay and status line are
//! written to the log.

use std::fs;
use std::io::{ErrorKind, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use relay_core::{
    ConfigError, ConfigStore, DeviceConfig, LinkError, NetworkCandidate, NodeSettings,
    RelayOutput, StatusDisplay, WifiDriver,
};

/// Signal strength reported for the simulated access point.
const SIMULATED_RSSI: i8 = -42;

/// A radio that always sees one access point and joins it instantly.
#[derive(Debug, Clone)]
pub struct SimulatedWifi {
    access_point: String,
    gateway: Ipv4Addr,
    joined: Option<String>,
}

impl SimulatedWifi {
    pub fn new(access_point: impl Into<String>, gateway: Ipv4Addr) -> Self {
        Self {
            access_point: access_point.into(),
            gateway,
            joined: None,
        }
    }

    /// Advertise the fixed target when there is one, else the provisioning
    /// network. The gateway is loopback.
    pub fn from_settings(settings: &NodeSettings) -> Self {
        let access_point = match &settings.fixed_target {
            Some(target) => target.ssid.clone(),
            None => settings.provisioning_ssid.clone(),
        };
        Self::new(access_point, Ipv4Addr::LOCALHOST)
    }
}

impl WifiDriver for SimulatedWifi {
    fn enter_station_mode(&mut self) -> Result<(), LinkError> {
        self.joined = None;
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<NetworkCandidate>, LinkError> {
        Ok(vec![NetworkCandidate::new(&self.access_point, SIMULATED_RSSI)])
    }

    fn begin(&mut self, ssid: &str, _password: &str) -> Result<(), LinkError> {
        if ssid != self.access_point {
            return Err(LinkError::Wifi(format!("network '{}' is not in range", ssid)));
        }
        debug!("Simulated association with {}", ssid);
        self.joined = Some(ssid.to_string());
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.joined.is_some()
    }

    fn gateway(&mut self) -> Option<Ipv4Addr> {
        self.joined.as_ref().map(|_| self.gateway)
    }
}

/// Device record kept in a JSON file.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigStore for FileConfigStore {
    fn read_record(&mut self) -> Result<Option<DeviceConfig>, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::ReadError(e.to_string())),
        };

        match serde_json::from_str(&text) {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                warn!("Ignoring unreadable record in {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    /// Write to a sibling temp file, sync it, then rename over the record.
    fn write_record(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_vec_pretty(config)
            .map_err(|e| ConfigError::InvalidData(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| ConfigError::WriteError(format!("{}: {}", self.path.display(), e)))
    }
}

/// Relay state goes to the log.
#[derive(Debug, Default)]
pub struct TracingRelay;

impl RelayOutput for TracingRelay {
    fn set(&mut self, on: bool) {
        info!("Relay {}", if on { "ON" } else { "OFF" });
    }
}

/// Status line in the log, repeated lines suppressed.
#[derive(Debug, Default)]
pub struct TracingDisplay {
    last: String,
}

impl StatusDisplay for TracingDisplay {
    fn show(&mut self, text: &str) {
        if self.last != text {
            info!("[status] {}", text);
            self.last = text.to_string();
        }
    }
}
