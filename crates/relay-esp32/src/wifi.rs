//! WiFi station driver for ESP32.
//!
//! Wraps `BlockingWifi<EspWifi>` behind the non-blocking [`WifiDriver`]
//! contract: `begin` only starts the association, and the connection
//! manager polls [`WifiDriver::is_connected`] until the netif is up.

use std::net::Ipv4Addr;

use anyhow::Result;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, peripheral},
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};
use log::{debug, info, warn};

use relay_core::{LinkError, NetworkCandidate, WifiDriver};

fn wifi_err(e: impl std::fmt::Display) -> LinkError {
    LinkError::Wifi(e.to_string())
}

/// Station-mode radio.
pub struct EspWifiDriver {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl EspWifiDriver {
    /// Take the modem. `nvs` lets the driver keep its calibration data.
    pub fn new(
        modem: impl peripheral::Peripheral<P = Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self { wifi })
    }
}

impl WifiDriver for EspWifiDriver {
    fn enter_station_mode(&mut self) -> Result<(), LinkError> {
        if self.wifi.is_connected().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .map_err(wifi_err)?;
        if !self.wifi.is_started().map_err(wifi_err)? {
            self.wifi.start().map_err(wifi_err)?;
        }
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<NetworkCandidate>, LinkError> {
        info!("Scanning for WiFi networks...");
        let ap_infos = self.wifi.scan().map_err(wifi_err)?;
        debug!("Scan returned {} networks", ap_infos.len());

        Ok(ap_infos
            .into_iter()
            .map(|ap| NetworkCandidate::new(ap.ssid.as_str(), ap.signal_strength))
            .collect())
    }

    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        let auth_method = if password.is_empty() {
            info!("WiFi password is empty, using open network");
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| LinkError::Wifi(format!("SSID '{}' too long (max 32 chars)", ssid)))?,
            password: password
                .try_into()
                .map_err(|_| LinkError::Wifi("Password too long (max 64 chars)".to_string()))?,
            auth_method,
            ..Default::default()
        };

        self.wifi
            .set_configuration(&Configuration::Client(config))
            .map_err(wifi_err)?;

        info!("Connecting to '{}'...", ssid);
        self.wifi.wifi_mut().connect().map_err(wifi_err)
    }

    fn is_connected(&mut self) -> bool {
        match self.wifi.is_up() {
            Ok(up) => up,
            Err(e) => {
                warn!("WiFi status query failed: {}", e);
                false
            }
        }
    }

    fn gateway(&mut self) -> Option<Ipv4Addr> {
        let ip_info = self.wifi.wifi().sta_netif().get_ip_info().ok()?;
        if ip_info.subnet.gateway.is_unspecified() {
            return None;
        }
        Some(ip_info.subnet.gateway)
    }
}
