//! JSON codec for protocol messages.
//!
//! Decoding never panics. Anything that is not a well-formed message is
//! reported as a [`CodecError`] and the packet is dropped by the caller;
//! framing is unaffected since it runs one layer below.

use serde_json::Value;
use thiserror::Error;

use crate::messages::{Command, Message, RequestId, Response, TypedFrame};

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Payload is not a JSON object.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Object has no `type` and is not a response either.
    #[error("Message has no type")]
    MissingType,

    /// Unknown `type` and no `id` to answer to.
    #[error("Unknown message type '{0}'")]
    UnknownType(String),

    /// Known `type` with missing or mistyped fields.
    #[error("Malformed '{kind}' message: {reason}")]
    MalformedBody { kind: String, reason: String },
}

/// Decode a packet payload.
pub fn decode(payload: &[u8]) -> Result<Message, CodecError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| CodecError::Malformed(e.to_string()))?;

    if !value.is_object() {
        return Err(CodecError::Malformed("expected a JSON object".to_string()));
    }

    let kind = match value.get("type") {
        None => {
            return serde_json::from_value::<Response>(value)
                .map(Message::Response)
                .map_err(|_| CodecError::MissingType);
        }
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => {
            return Err(CodecError::Malformed(format!(
                "type must be a string, got {}",
                other
            )));
        }
    };

    if !TypedFrame::is_known_type(&kind) {
        let id = match value.get("id") {
            Some(id) => serde_json::from_value::<RequestId>(id.clone()).map_err(|e| {
                CodecError::MalformedBody {
                    kind: kind.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => return Err(CodecError::UnknownType(kind)),
        };
        return Ok(Message::Request(crate::messages::Request {
            id,
            command: Command::Unsupported(kind),
        }));
    }

    serde_json::from_value::<TypedFrame>(value)
        .map(Message::from)
        .map_err(|e| CodecError::MalformedBody {
            kind,
            reason: e.to_string(),
        })
}

/// Encode a message to its JSON payload.
pub fn encode(msg: &Message) -> Result<Vec<u8>, CodecError> {
    let bytes = match msg {
        Message::Notify(notify) => serde_json::to_vec(&TypedFrame::Msg {
            body: notify.body.clone(),
        })?,
        Message::Request(request) => {
            let id = request.id.clone();
            match &request.command {
                Command::SetRelay(on) => serde_json::to_vec(&TypedFrame::Relay { id, on: *on })?,
                Command::SetNetworkPattern(pattern) => {
                    serde_json::to_vec(&TypedFrame::HostRegex {
                        id,
                        pattern: pattern.clone(),
                    })?
                }
                Command::SetPassword(value) => serde_json::to_vec(&TypedFrame::HostPassword {
                    id,
                    value: value.clone(),
                })?,
                Command::Unsupported(kind) => {
                    serde_json::to_vec(&serde_json::json!({ "type": kind, "id": id }))?
                }
            }
        }
        Message::Response(response) => serde_json::to_vec(response)?,
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{make_notify, make_response, Request};
    use pretty_assertions::assert_eq;

    fn request(id: RequestId, command: Command) -> Message {
        Message::Request(Request { id, command })
    }

    #[test]
    fn test_decode_relay_request() {
        let msg = decode(br#"{"type":"relay","id":"42","on":true}"#).unwrap();
        assert_eq!(msg, request("42".into(), Command::SetRelay(true)));
    }

    #[test]
    fn test_decode_host_regex_request() {
        let msg = decode(br#"{"type":"hostRegex","id":3,"pattern":"-5G"}"#).unwrap();
        assert_eq!(
            msg,
            request(RequestId::Number(3), Command::SetNetworkPattern("-5G".to_string()))
        );
    }

    #[test]
    fn test_decode_host_password_request() {
        let msg = decode(br#"{"type":"hostPassword","id":4,"value":"secret"}"#).unwrap();
        assert_eq!(msg, request(RequestId::Number(4), Command::SetPassword("secret".to_string())));
    }

    #[test]
    fn test_decode_notify_and_response() {
        assert_eq!(
            decode(br#"{"type":"msg","body":"hello"}"#).unwrap(),
            make_notify("hello")
        );
        assert_eq!(
            decode(br#"{"id":9,"success":false}"#).unwrap(),
            make_response(RequestId::Number(9), false)
        );
    }

    #[test]
    fn test_decode_unknown_type_with_id() {
        let msg = decode(br#"{"type":"reboot","id":5}"#).unwrap();
        assert_eq!(msg, request(RequestId::Number(5), Command::Unsupported("reboot".to_string())));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(b"[1,2]"), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(br#"{"id":1}"#), Err(CodecError::MissingType)));
        assert!(matches!(decode(br#"{"type":7,"id":1}"#), Err(CodecError::Malformed(_))));
        assert!(matches!(
            decode(br#"{"type":"reboot"}"#),
            Err(CodecError::UnknownType(kind)) if kind == "reboot"
        ));
        assert!(matches!(
            decode(br#"{"type":"relay","id":1,"on":"yes"}"#),
            Err(CodecError::MalformedBody { kind, .. }) if kind == "relay"
        ));
        assert!(matches!(
            decode(br#"{"type":"hostRegex","pattern":"-5G"}"#),
            Err(CodecError::MalformedBody { .. })
        ));
        assert!(matches!(
            decode(br#"{"type":"reboot","id":true}"#),
            Err(CodecError::MalformedBody { .. })
        ));
    }

    #[test]
    fn test_encode_notify() {
        let json = encode(&make_notify("hello")).unwrap();
        assert_eq!(json, br#"{"type":"msg","body":"hello"}"#.to_vec());
    }

    #[test]
    fn test_encode_response_echoes_id_form() {
        let json = encode(&make_response("42".into(), true)).unwrap();
        assert_eq!(json, br#"{"id":"42","success":true}"#.to_vec());

        let json = encode(&make_response(RequestId::Number(42), true)).unwrap();
        assert_eq!(json, br#"{"id":42,"success":true}"#.to_vec());
    }

    #[test]
    fn test_negative_and_fractional_ids_are_echoed() {
        let msg = decode(br#"{"type":"relay","on":true,"id":-1}"#).unwrap();
        let Message::Request(req) = msg else {
            panic!("expected a request, got {:?}", msg);
        };
        assert_eq!(req.id, RequestId::Other(serde_json::Number::from(-1i64)));
        assert_eq!(
            encode(&make_response(req.id, true)).unwrap(),
            br#"{"id":-1,"success":true}"#.to_vec()
        );

        let msg = decode(br#"{"type":"hostPassword","id":1.5,"value":"pw"}"#).unwrap();
        let Message::Request(req) = msg else {
            panic!("expected a request, got {:?}", msg);
        };
        assert_eq!(req.id.to_string(), "1.5");
        assert_eq!(
            encode(&make_response(req.id, false)).unwrap(),
            br#"{"id":1.5,"success":false}"#.to_vec()
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let messages = vec![
            make_notify("hello"),
            make_response("abc".into(), true),
            make_response(RequestId::Number(1), false),
            request(RequestId::Number(2), Command::SetRelay(false)),
            request("x".into(), Command::SetNetworkPattern("-relay".to_string())),
            request(RequestId::Number(3), Command::SetPassword("pw".to_string())),
            request(RequestId::Number(4), Command::Unsupported("reboot".to_string())),
        ];

        for msg in messages {
            let bytes = encode(&msg).unwrap();
            assert_eq!(decode(&bytes).unwrap(), msg);
        }
    }
}
