//! # relay-protocol
//!
//! Relay control protocol message types, codec and dispatcher.
//!
//! This crate defines the JSON messages carried inside framed packets and the
//! logic that turns requests into actions on the device.

pub mod codec;
pub mod dispatcher;
pub mod messages;

pub use codec::{decode, encode, CodecError};
pub use dispatcher::Dispatcher;
pub use messages::*;
