//! ESP32-specific components for the relay node.
//!
//! This crate provides the platform side of the collaborator traits defined in
//! `relay-core`:
//! - WiFi station driver over `EspWifi`
//! - NVS (Non-Volatile Storage) for the device record
//! - GPIO relay output and a log-backed status line
//! - Non-blocking TCP session over `std::net`
//!
//! # Architecture
//!
//! The connection manager from `relay-node` is platform-agnostic. The main
//! binary (`relay-node-esp32`) builds these components from the board
//! peripherals and hands them to the manager.
//!
//! # Example
//!
//! ```ignore
//! use relay_esp32::wifi::EspWifiDriver;
//! use relay_esp32::config::NvsConfigStore;
//!
//! let wifi = EspWifiDriver::new(peripherals.modem, sysloop, Some(nvs.clone()))?;
//! let store = NvsConfigStore::new(nvs)?;
//! ```

pub mod config;
pub mod relay;
pub mod transport;
pub mod wifi;
