//! Request routing.
//!
//! Turns decoded packets into side effects on the [`DeviceContext`] and
//! builds the reply. Configuration changes are committed to storage before
//! the reply is built, so the peer never sees `success: true` for a change
//! that is not durable yet.

use relay_core::{ConfigError, DeviceConfig, DeviceContext};
use tracing::{debug, error, info, warn};

use crate::codec::decode;
use crate::messages::{Command, Message, Request, Response};

/// Dispatcher logic, independent of the transport that delivered the packet.
pub struct Dispatcher;

impl Dispatcher {
    /// Decode one packet payload and act on it.
    ///
    /// Returns the reply to send, if any. Only requests are answered;
    /// malformed payloads are logged and dropped.
    pub fn handle_packet(ctx: &mut DeviceContext, payload: &[u8]) -> Option<Message> {
        match decode(payload) {
            Ok(Message::Request(request)) => {
                Some(Message::Response(Self::handle_request(ctx, request)))
            }
            Ok(Message::Notify(notify)) => {
                info!("Peer says: {}", notify.body);
                None
            }
            Ok(Message::Response(response)) => {
                debug!("Ignoring response {} from peer", response.id);
                None
            }
            Err(e) => {
                warn!("Dropping {} byte packet: {}", payload.len(), e);
                None
            }
        }
    }

    /// Run one command to completion and build its response.
    pub fn handle_request(ctx: &mut DeviceContext, request: Request) -> Response {
        let Request { id, command } = request;
        debug!("Request {} ({})", id, command.type_name());

        let success = match command {
            Command::SetRelay(on) => {
                info!("Relay set to {}", if on { "on" } else { "off" });
                ctx.set_relay(on);
                true
            }
            Command::SetNetworkPattern(pattern) => {
                debug!("Network pattern update: {}", pattern);
                Self::apply(ctx, "network pattern", |config| {
                    config.with_network_pattern(&pattern)
                })
            }
            Command::SetPassword(password) => {
                debug!("Password update ({} bytes)", password.len());
                Self::apply(ctx, "password", |config| config.with_password(&password))
            }
            Command::Unsupported(kind) => {
                warn!("Unsupported request type '{}' (id {})", kind, id);
                false
            }
        };

        Response { id, success }
    }

    fn apply<F>(ctx: &mut DeviceContext, what: &str, update: F) -> bool
    where
        F: FnOnce(&DeviceConfig) -> Result<DeviceConfig, ConfigError>,
    {
        let next = match update(ctx.config()) {
            Ok(next) => next,
            Err(e) => {
                warn!("Rejected {}: {}", what, e);
                return false;
            }
        };

        match ctx.update_config(next) {
            Ok(()) => {
                info!("Stored new {}", what);
                true
            }
            Err(e) => {
                error!("Failed to store {}: {}", what, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::messages::{make_notify, make_response, RequestId};
    use pretty_assertions::assert_eq;
    use relay_core::{
        ConfigStore, MemoryConfigStore, NodeSettings, RelayOutput, StatusDisplay,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedStore(Rc<RefCell<MemoryConfigStore>>);

    impl ConfigStore for SharedStore {
        fn read_record(&mut self) -> Result<Option<DeviceConfig>, ConfigError> {
            self.0.borrow_mut().read_record()
        }

        fn write_record(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
            self.0.borrow_mut().write_record(config)
        }
    }

    #[derive(Clone, Default)]
    struct RelayLog(Rc<RefCell<Vec<bool>>>);

    impl RelayOutput for RelayLog {
        fn set(&mut self, on: bool) {
            self.0.borrow_mut().push(on);
        }
    }

    struct Quiet;

    impl StatusDisplay for Quiet {
        fn show(&mut self, _text: &str) {}
    }

    struct Fixture {
        ctx: DeviceContext,
        store: SharedStore,
        relay: RelayLog,
    }

    fn fixture() -> Fixture {
        let store = SharedStore::default();
        let relay = RelayLog::default();
        let ctx = DeviceContext::open(
            &NodeSettings::default(),
            Box::new(store.clone()),
            Box::new(relay.clone()),
            Box::new(Quiet),
        )
        .unwrap();
        Fixture { ctx, store, relay }
    }

    fn send(ctx: &mut DeviceContext, json: &str) -> Option<Message> {
        Dispatcher::handle_packet(ctx, json.as_bytes())
    }

    #[test]
    fn test_relay_request_sets_pin_once_and_acknowledges() {
        let mut f = fixture();

        let reply = send(&mut f.ctx, r#"{"type":"relay","on":true,"id":"42"}"#);

        assert_eq!(*f.relay.0.borrow(), vec![true]);
        assert_eq!(reply, Some(make_response("42".into(), true)));
        assert_eq!(
            encode(&reply.unwrap()).unwrap(),
            br#"{"id":"42","success":true}"#.to_vec()
        );
    }

    #[test]
    fn test_pattern_update_is_committed_before_ack() {
        let mut f = fixture();
        let commits_before = f.store.0.borrow().commits();

        let reply = send(&mut f.ctx, r#"{"type":"hostRegex","id":1,"pattern":"-5G"}"#);

        assert_eq!(reply, Some(make_response(RequestId::Number(1), true)));
        assert_eq!(f.store.0.borrow().commits(), commits_before + 1);
        assert_eq!(f.store.0.borrow().record().unwrap().network_pattern, "-5G");
        assert_eq!(f.ctx.config().network_pattern, "-5G");
    }

    #[test]
    fn test_oversized_pattern_is_rejected_without_commit() {
        let mut f = fixture();
        let before = f.store.0.borrow().record().cloned();
        let commits_before = f.store.0.borrow().commits();
        let pattern = "p".repeat(51);

        let reply = send(
            &mut f.ctx,
            &format!(r#"{{"type":"hostRegex","id":2,"pattern":"{}"}}"#, pattern),
        );

        assert_eq!(reply, Some(make_response(RequestId::Number(2), false)));
        assert_eq!(f.store.0.borrow().commits(), commits_before);
        assert_eq!(f.store.0.borrow().record().cloned(), before);
        assert_ne!(f.ctx.config().network_pattern, pattern);
    }

    #[test]
    fn test_password_bounds() {
        let mut f = fixture();

        let ok = send(&mut f.ctx, r#"{"type":"hostPassword","id":3,"value":"0123456789abcdef"}"#);
        assert_eq!(ok, Some(make_response(RequestId::Number(3), true)));
        assert_eq!(f.store.0.borrow().record().unwrap().password, "0123456789abcdef");

        let too_long = send(&mut f.ctx, r#"{"type":"hostPassword","id":4,"value":"0123456789abcdefX"}"#);
        assert_eq!(too_long, Some(make_response(RequestId::Number(4), false)));
        assert_eq!(f.ctx.config().password, "0123456789abcdef");
    }

    #[test]
    fn test_unknown_request_type_fails() {
        let mut f = fixture();

        let reply = send(&mut f.ctx, r#"{"type":"reboot","id":"r1"}"#);

        assert_eq!(reply, Some(make_response("r1".into(), false)));
        assert!(f.relay.0.borrow().is_empty());
    }

    #[test]
    fn test_negative_id_still_gets_a_reply() {
        let mut f = fixture();

        let reply = send(&mut f.ctx, r#"{"type":"relay","on":true,"id":-7}"#);

        assert_eq!(*f.relay.0.borrow(), vec![true]);
        assert_eq!(
            encode(&reply.unwrap()).unwrap(),
            br#"{"id":-7,"success":true}"#.to_vec()
        );
    }

    #[test]
    fn test_malformed_and_one_way_messages_get_no_reply() {
        let mut f = fixture();

        assert_eq!(send(&mut f.ctx, "{oops"), None);
        assert_eq!(send(&mut f.ctx, r#"{"type":"relay","id":5}"#), None);
        assert_eq!(send(&mut f.ctx, r#"{"type":"msg","body":"hi"}"#), None);
        assert_eq!(send(&mut f.ctx, r#"{"id":6,"success":true}"#), None);
        assert!(f.relay.0.borrow().is_empty());
    }

    #[test]
    fn test_greeting_shape() {
        let json = encode(&make_notify(crate::messages::GREETING)).unwrap();
        assert_eq!(json, br#"{"type":"msg","body":"hello"}"#.to_vec());
    }
}
