//! Interfaces to the collaborators around the core.
//!
//! The connection manager never talks to hardware directly. Each platform
//! provides these traits: the ESP32 firmware wraps the ESP-IDF WiFi driver,
//! GPIO and a socket; the desktop runtime simulates the radio and uses tokio
//! for the socket. Tests plug in fakes.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

use crate::selector::NetworkCandidate;

/// Failures reported by the WiFi driver or the TCP transport.
///
/// All of them except `ResourceExhausted` are retryable.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("WiFi driver error: {0}")]
    Wifi(String),

    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: SocketAddr, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("no session established")]
    NotConnected,

    /// The network stack could not allocate. Not retryable.
    #[error("out of memory: {0}")]
    ResourceExhausted(String),
}

/// Station-mode WiFi radio.
pub trait WifiDriver {
    /// Switch the radio into station (client) mode.
    fn enter_station_mode(&mut self) -> Result<(), LinkError>;

    /// Scan for visible networks.
    fn scan(&mut self) -> Result<Vec<NetworkCandidate>, LinkError>;

    /// Start associating with a network. Completion is observed through
    /// [`WifiDriver::is_connected`].
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    /// Whether the link is up and has an address.
    fn is_connected(&mut self) -> bool;

    /// Gateway address handed out by the network, once associated.
    fn gateway(&mut self) -> Option<Ipv4Addr>;
}

/// Something that happened on the TCP session since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection attempt completed.
    Connected,
    /// Bytes arrived from the peer.
    Data(Vec<u8>),
    /// The peer closed, the link broke or the connection attempt failed.
    Disconnected,
}

/// A single outbound TCP session.
pub trait SessionTransport {
    /// Start connecting. The outcome is reported as a [`SessionEvent`].
    fn connect(&mut self, addr: SocketAddr) -> Result<(), LinkError>;

    /// Queue bytes for the peer.
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Next pending event, without blocking.
    fn poll_event(&mut self) -> Option<SessionEvent>;

    /// Tear down the session. Pending events are discarded.
    fn close(&mut self);
}

/// The relay pin. Fire and forget.
pub trait RelayOutput {
    fn set(&mut self, on: bool);
}

/// Best-effort status line (OLED, serial console, log).
pub trait StatusDisplay {
    fn show(&mut self, text: &str);
}

/// Blocking pause used between state machine steps.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// [`Delay`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
