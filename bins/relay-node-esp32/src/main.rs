//! Relay node firmware for ESP32.
//!
//! This binary requires the ESP32 Rust toolchain.
//! It will not compile with the standard Rust toolchain.
//!
//! The connection manager, framing and protocol are the same code the Linux
//! build runs; only the collaborators come from `relay-esp32`.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::info;

use relay_core::{DeviceContext, NodeSettings, ThreadDelay};
use relay_esp32::config::NvsConfigStore;
use relay_esp32::relay::{GpioRelay, LogDisplay};
use relay_esp32::transport::SocketTransport;
use relay_esp32::wifi::EspWifiDriver;
use relay_node::ConnectionManager;

fn main() -> anyhow::Result<()> {
    // ESP32-specific: Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    info!("Relay node starting...");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let settings = NodeSettings::default();

    let wifi = EspWifiDriver::new(peripherals.modem, sysloop, Some(nvs.clone()))?;
    let store = NvsConfigStore::new(nvs)?;
    // Relay on GPIO2 (on-board LED on most DevKits)
    let relay = GpioRelay::new(peripherals.pins.gpio2)?;

    let ctx = DeviceContext::open(
        &settings,
        Box::new(store),
        Box::new(relay),
        Box::new(LogDisplay::default()),
    )?;
    info!("Network pattern: '{}'", ctx.config().network_pattern);

    let mut manager = ConnectionManager::new(settings, ctx, wifi, SocketTransport::new(), ThreadDelay);
    manager.run()
}
