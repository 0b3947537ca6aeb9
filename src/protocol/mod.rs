//! WebSocket protocol message types.
//!
//! This module defines the packet format spoken by
//! [`WebSocketTransport`](crate::transport::WebSocketTransport).
//!
//! # Protocol Overview
//!
//! | Packet | Direction | Purpose |
//! |--------|-----------|---------|
//! | `handshake` | Server → Client | Opens a session, carries the session id |
//! | `event` | Both | Message on a named channel |
//! | `disconnect` | Both | Ends the session, no reconnection |
//! | `ping` | Server → Client | Heartbeat |
//! | `pong` | Client → Server | Heartbeat answer |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `packet` | Packet enum and JSON codec |

// ============================================================================
// Submodules
// ============================================================================

/// Packet enum and JSON codec.
pub mod packet;

// ============================================================================
// Re-exports
// ============================================================================

pub use packet::Packet;
