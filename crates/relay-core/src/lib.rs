//! # relay-core
//!
//! Core building blocks of the relay node.
//!
//! This crate provides:
//! - Packet framing over a TCP byte stream
//! - The persisted device record and its storage trait
//! - WiFi network selection by SSID suffix
//! - Collaborator traits for the radio, socket, relay and status display
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and ESP32 (esp-idf) targets.

pub mod config;
pub mod device;
pub mod framer;
pub mod link;
pub mod selector;
pub mod settings;

pub use config::{ConfigError, ConfigStore, DeviceConfig, MemoryConfigStore};
pub use device::DeviceContext;
pub use framer::{FeedReport, Framer, FramingError};
pub use link::{
    Delay, LinkError, RelayOutput, SessionEvent, SessionTransport, StatusDisplay, ThreadDelay,
    WifiDriver,
};
pub use selector::{NetworkCandidate, NetworkSelector, SsidRule};
pub use settings::{FixedTarget, NodeSettings};
