//! JSON packets exchanged by the WebSocket transport.
//!
//! # Format
//!
//! Every packet is a JSON object tagged by `type`:
//!
//! ```json
//! { "type": "handshake", "sid": "b4c1...", "recovered": false }
//! { "type": "event", "event": "server/message", "args": ["Hello"] }
//! { "type": "disconnect" }
//! { "type": "ping" }
//! { "type": "pong" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, to_string};

use crate::error::{Error, Result};

// ============================================================================
// Packet
// ============================================================================

/// A single protocol packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    /// Server → client. First packet of every session.
    Handshake {
        /// Session identifier.
        sid: String,
        /// Whether a previous session was recovered.
        #[serde(default)]
        recovered: bool,
    },

    /// Either direction. A message on a named channel.
    Event {
        /// Channel name.
        event: String,
        /// Payload arguments.
        #[serde(default)]
        args: Vec<Value>,
    },

    /// Either direction. Ends the session without reconnection.
    Disconnect,

    /// Server → client heartbeat.
    Ping,

    /// Client → server heartbeat answer.
    Pong,
}

impl Packet {
    /// Creates an event packet.
    #[inline]
    pub fn event(channel: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event {
            event: channel.into(),
            args,
        }
    }

    /// Serializes the packet to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if an argument cannot be serialized.
    pub fn encode(&self) -> Result<String> {
        Ok(to_string(self)?)
    }

    /// Parses a packet from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the text is not a known packet.
    pub fn decode(text: &str) -> Result<Self> {
        from_str(text).map_err(|e| Error::protocol(format!("Malformed packet: {e}")))
    }

    /// Returns the packet type tag.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "handshake",
            Self::Event { .. } => "event",
            Self::Disconnect => "disconnect",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let packet = Packet::event("server/message", vec![json!("Hello from the server!")]);
        let value: Value = serde_json::from_str(&packet.encode().expect("encode")).expect("json");

        assert_eq!(
            value,
            json!({
                "type": "event",
                "event": "server/message",
                "args": ["Hello from the server!"]
            })
        );
    }

    #[test]
    fn test_decode_handshake_defaults() {
        let packet = Packet::decode(r#"{"type":"handshake","sid":"abc"}"#).expect("parse");
        assert_eq!(
            packet,
            Packet::Handshake {
                sid: "abc".to_string(),
                recovered: false
            }
        );
    }

    #[test]
    fn test_decode_unit_packets() {
        assert_eq!(
            Packet::decode(r#"{"type":"disconnect"}"#).expect("parse"),
            Packet::Disconnect
        );
        assert_eq!(Packet::decode(r#"{"type":"ping"}"#).expect("parse"), Packet::Ping);
        assert_eq!(Packet::Pong.encode().expect("encode"), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = Packet::decode(r#"{"type":"upgrade"}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));

        assert!(Packet::decode("not json").is_err());
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Packet::Ping.type_name(), "ping");
        assert_eq!(Packet::event("a", vec![]).type_name(), "event");
    }
}
