//! Text framing for the push channel.
//!
//! Wire format (UTF-8 text frames):
//!
//! | Frame | Meaning |
//! |---|---|
//! | `2` | ping, answered with `3` |
//! | `3` | pong |
//! | `0{…}` / `40{…}` | session open, optional JSON handshake |
//! | `1` / `41` | session close |
//! | `42[name,payload]` | application event |
//!
//! Anything else decodes to [`Frame::Ignored`].

use serde_json::Value;

use crate::errors::CodecError;

/// Keep-alive probe sent by the server.
pub const PING: &str = "2";
/// Reply to [`PING`].
pub const PONG: &str = "3";
/// Prefix of an application event frame.
pub const EVENT_PREFIX: &str = "42";
/// Session-close frame sent on an intentional disconnect.
pub const SESSION_CLOSE: &str = "41";

/// Event name for job progress reports.
pub const STATUS_UPDATE_EVENT: &str = "status_update";
/// Event name for room subscription requests.
pub const JOIN_EVENT: &str = "join";

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Keep-alive probe.
    Ping,
    /// Keep-alive reply.
    Pong,
    /// Session opened; carries the handshake payload when present.
    Open(Option<Value>),
    /// Session closed by the peer.
    Close,
    /// Application event.
    Event {
        /// Event name.
        name: String,
        /// Event payload (`null` when the frame carried only a name).
        payload: Value,
    },
    /// Unknown frame, skipped for forward compatibility.
    Ignored,
}

/// Decode one raw text frame.
pub fn decode(raw: &str) -> Result<Frame, CodecError> {
    match raw {
        PING => return Ok(Frame::Ping),
        PONG => return Ok(Frame::Pong),
        "1" | SESSION_CLOSE => return Ok(Frame::Close),
        _ => {}
    }

    if let Some(body) = raw.strip_prefix(EVENT_PREFIX) {
        return decode_event(body);
    }
    if let Some(body) = raw.strip_prefix("40") {
        return decode_open(body);
    }
    if let Some(body) = raw.strip_prefix('0') {
        return decode_open(body);
    }
    Ok(Frame::Ignored)
}

/// Encode an application event as `42[name,payload]`.
pub fn encode(name: &str, payload: &Value) -> String {
    let body = Value::Array(vec![Value::String(name.to_owned()), payload.clone()]);
    format!("{EVENT_PREFIX}{body}")
}

/// Encode the join request for `room_id`.
pub fn encode_join(room_id: &str) -> String {
    encode(JOIN_EVENT, &serde_json::json!({ "room_id": room_id }))
}

fn decode_event(body: &str) -> Result<Frame, CodecError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(mut items) = value else {
        return Err(CodecError::NotAnArray);
    };
    if items.is_empty() || items.len() > 2 {
        return Err(CodecError::Arity { found: items.len() });
    }
    let payload = if items.len() == 2 {
        items.pop().unwrap_or(Value::Null)
    } else {
        Value::Null
    };
    let Some(Value::String(name)) = items.pop() else {
        return Err(CodecError::EventName);
    };
    Ok(Frame::Event { name, payload })
}

fn decode_open(body: &str) -> Result<Frame, CodecError> {
    if body.is_empty() {
        return Ok(Frame::Open(None));
    }
    Ok(Frame::Open(Some(serde_json::from_str(body)?)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
