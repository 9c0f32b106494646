//! Protocol message types.
//!
//! Every packet payload is one JSON object:
//! - Device → Peer: Notify (greeting), Response
//! - Peer → Device: Request (relay, hostRegex, hostPassword)
//!
//! ```json
//! {"type":"msg","body":"hello"}
//! {"type":"relay","id":42,"on":true}
//! {"type":"hostRegex","id":"a1","pattern":"-5G"}
//! {"type":"hostPassword","id":7,"value":"secret"}
//! {"id":42,"success":true}
//! ```
//!
//! Responses carry no `type`; they are recognized by their `id` and
//! `success` fields.

use serde::{Deserialize, Serialize};

pub const TYPE_MSG: &str = "msg";
pub const TYPE_RELAY: &str = "relay";
pub const TYPE_HOST_REGEX: &str = "hostRegex";
pub const TYPE_HOST_PASSWORD: &str = "hostPassword";

/// Greeting sent right after the session comes up.
pub const GREETING: &str = "hello";

/// Request correlation token.
///
/// Peers may use numbers or strings; the reply echoes whichever was sent.
/// Negative and fractional numbers land in `Other` and are echoed as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    Text(String),
    Other(serde_json::Number),
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::Text(id.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::Text(s) => write!(f, "{}", s),
            RequestId::Other(n) => write!(f, "{}", n),
        }
    }
}

/// What a request asks the device to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drive the relay output.
    SetRelay(bool),
    /// Replace the SSID suffix used for network selection.
    SetNetworkPattern(String),
    /// Replace the network password.
    SetPassword(String),
    /// A request whose `type` this device does not know. Answered with
    /// `success: false`. The name is never one of the known types.
    Unsupported(String),
}

impl Command {
    /// The wire `type` of this command.
    pub fn type_name(&self) -> &str {
        match self {
            Command::SetRelay(_) => TYPE_RELAY,
            Command::SetNetworkPattern(_) => TYPE_HOST_REGEX,
            Command::SetPassword(_) => TYPE_HOST_PASSWORD,
            Command::Unsupported(kind) => kind,
        }
    }
}

/// One-way message, no reply expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notify {
    pub body: String,
}

/// A command with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub command: Command,
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    pub success: bool,
}

/// A decoded packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Notify(Notify),
    Request(Request),
    Response(Response),
}

/// Build a notify message.
pub fn make_notify(body: impl Into<String>) -> Message {
    Message::Notify(Notify { body: body.into() })
}

/// Build the reply for request `id`.
pub fn make_response(id: RequestId, success: bool) -> Message {
    Message::Response(Response { id, success })
}

/// Wire shape of every message that carries a `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum TypedFrame {
    #[serde(rename = "msg")]
    Msg { body: String },

    #[serde(rename = "relay")]
    Relay { id: RequestId, on: bool },

    #[serde(rename = "hostRegex")]
    HostRegex { id: RequestId, pattern: String },

    #[serde(rename = "hostPassword")]
    HostPassword { id: RequestId, value: String },
}

impl TypedFrame {
    pub(crate) fn is_known_type(kind: &str) -> bool {
        matches!(
            kind,
            TYPE_MSG | TYPE_RELAY | TYPE_HOST_REGEX | TYPE_HOST_PASSWORD
        )
    }
}

impl From<TypedFrame> for Message {
    fn from(frame: TypedFrame) -> Self {
        match frame {
            TypedFrame::Msg { body } => Message::Notify(Notify { body }),
            TypedFrame::Relay { id, on } => Message::Request(Request {
                id,
                command: Command::SetRelay(on),
            }),
            TypedFrame::HostRegex { id, pattern } => Message::Request(Request {
                id,
                command: Command::SetNetworkPattern(pattern),
            }),
            TypedFrame::HostPassword { id, value } => Message::Request(Request {
                id,
                command: Command::SetPassword(value),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_frame_serialization() {
        let frame = TypedFrame::Relay {
            id: RequestId::Number(42),
            on: true,
        };
        let json = serde_json::to_string(&frame).unwrap();

        assert!(json.contains("\"type\":\"relay\""));
        assert!(json.contains("\"id\":42"));
        assert!(json.contains("\"on\":true"));
    }

    #[test]
    fn test_request_id_keeps_its_form() {
        let number: RequestId = serde_json::from_str("7").unwrap();
        let text: RequestId = serde_json::from_str("\"7\"").unwrap();

        assert_eq!(number, RequestId::Number(7));
        assert_eq!(text, RequestId::Text("7".to_string()));
        assert_ne!(number, text);
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"7\"");
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_string(&Response {
            id: "42".into(),
            success: false,
        })
        .unwrap();
        assert_eq!(json, r#"{"id":"42","success":false}"#);
    }

    #[test]
    fn test_command_type_names() {
        assert_eq!(Command::SetRelay(true).type_name(), "relay");
        assert_eq!(Command::SetNetworkPattern(String::new()).type_name(), "hostRegex");
        assert_eq!(Command::SetPassword(String::new()).type_name(), "hostPassword");
        assert_eq!(Command::Unsupported("reboot".to_string()).type_name(), "reboot");
    }
}
