//! # relay-node
//!
//! Connection manager for the relay node, with a pluggable socket runtime.
//!
//! The state machine in [`connection`] is synchronous and runs on a single
//! thread. Enable features based on target platform:
//! - `tokio-runtime` (default) - TCP transport for Linux/desktop
//! - ESP32 builds bring their own transport from `relay-esp32`

pub mod connection;
#[cfg(feature = "tokio-runtime")]
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState, FatalError, SessionState, WifiState};
#[cfg(feature = "tokio-runtime")]
pub use transport::TokioTransport;

pub use relay_core::{DeviceContext, NodeSettings};
