//! Transport connection options.
//!
//! Durations are serialized as integer milliseconds so the options can be
//! loaded from JSON configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use socket_client_manager::transport::TransportOptions;
//!
//! let options = TransportOptions::new()
//!     .with_path("/realtime")
//!     .with_reconnection_delay(Duration::from_millis(250))
//!     .with_reconnection_attempts(5)
//!     .with_query("token", "abc");
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default endpoint path.
pub const DEFAULT_PATH: &str = "/socket.io";

/// Default initial reconnection delay.
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_millis(500);

/// Default reconnection delay cap.
pub const DEFAULT_RECONNECTION_DELAY_MAX: Duration = Duration::from_millis(2000);

/// Default timeout for dialing and handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// TransportOptions
// ============================================================================

/// Options handed to a [`TransportConnector`](super::TransportConnector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportOptions {
    /// Endpoint path on the server.
    pub path: String,

    /// Whether the transport reconnects after an unexpected close.
    pub reconnection: bool,

    /// Maximum reconnection attempts; `None` means unlimited.
    pub reconnection_attempts: Option<u32>,

    /// Initial delay between reconnection attempts.
    #[serde(with = "duration_ms")]
    pub reconnection_delay: Duration,

    /// Upper bound for the reconnection delay.
    #[serde(with = "duration_ms")]
    pub reconnection_delay_max: Duration,

    /// Whether the connection is opened as soon as the manager is ready.
    pub auto_connect: bool,

    /// Timeout for dialing and handshake.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Extra query parameters sent with the connection request.
    pub query: BTreeMap<String, String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl TransportOptions {
    /// Creates options with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            reconnection: true,
            reconnection_attempts: None,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
            reconnection_delay_max: DEFAULT_RECONNECTION_DELAY_MAX,
            auto_connect: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TransportOptions {
    /// Sets the endpoint path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Enables or disables reconnection.
    #[inline]
    #[must_use]
    pub fn with_reconnection(mut self, reconnection: bool) -> Self {
        self.reconnection = reconnection;
        self
    }

    /// Limits the number of reconnection attempts.
    #[inline]
    #[must_use]
    pub fn with_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.reconnection_attempts = Some(attempts);
        self
    }

    /// Sets the initial reconnection delay.
    #[inline]
    #[must_use]
    pub fn with_reconnection_delay(mut self, delay: Duration) -> Self {
        self.reconnection_delay = delay;
        self
    }

    /// Sets the reconnection delay cap.
    #[inline]
    #[must_use]
    pub fn with_reconnection_delay_max(mut self, delay: Duration) -> Self {
        self.reconnection_delay_max = delay;
        self
    }

    /// Enables or disables connecting on creation.
    #[inline]
    #[must_use]
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Sets the dial and handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Adds a query parameter.
    #[inline]
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl TransportOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path is empty or relative, if the
    /// delay cap is below the initial delay, or if the connect timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(Error::config(format!(
                "path must start with '/', got {:?}",
                self.path
            )));
        }

        if self.reconnection_delay_max < self.reconnection_delay {
            return Err(Error::config(
                "reconnectionDelayMax must not be lower than reconnectionDelay",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::config("connectTimeout must be greater than zero"));
        }

        Ok(())
    }

    /// Returns the delay before reconnection attempt `attempt` (1-based).
    ///
    /// Doubles from the initial delay and saturates at the cap.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.reconnection_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.reconnection_delay_max)
    }

    /// Returns `true` if attempt `attempt` exceeds the configured limit.
    #[inline]
    #[must_use]
    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        self.reconnection_attempts
            .is_some_and(|limit| attempt > limit)
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
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
    fn test_defaults() {
        let options = TransportOptions::default();
        assert_eq!(options.path, "/socket.io");
        assert_eq!(options.reconnection_delay, Duration::from_millis(500));
        assert_eq!(options.reconnection_delay_max, Duration::from_millis(2000));
        assert_eq!(options.reconnection_attempts, None);
        assert!(options.reconnection);
        assert!(options.auto_connect);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_relative_path() {
        let options = TransportOptions::new().with_path("socket");
        assert!(options.validate().is_err());

        let options = TransportOptions::new().with_path("");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_delay_order() {
        let options = TransportOptions::new()
            .with_reconnection_delay(Duration::from_secs(5))
            .with_reconnection_delay_max(Duration::from_secs(1));
        let err = options.validate().unwrap_err();
        assert!(err.is_config());
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let options = TransportOptions::new();
        assert_eq!(options.backoff(1), Duration::from_millis(500));
        assert_eq!(options.backoff(2), Duration::from_millis(1000));
        assert_eq!(options.backoff(3), Duration::from_millis(2000));
        assert_eq!(options.backoff(10), Duration::from_millis(2000));
        assert_eq!(options.backoff(u32::MAX), Duration::from_millis(2000));
    }

    #[test]
    fn test_attempts_exhausted() {
        assert!(!TransportOptions::new().attempts_exhausted(1_000));

        let options = TransportOptions::new().with_reconnection_attempts(2);
        assert!(!options.attempts_exhausted(2));
        assert!(options.attempts_exhausted(3));
    }

    #[test]
    fn test_deserialize_from_json() {
        let options: TransportOptions = serde_json::from_value(json!({
            "path": "/ws",
            "reconnectionDelay": 100,
            "reconnectionDelayMax": 400,
            "reconnectionAttempts": 3,
            "query": { "room": "lobby" }
        }))
        .unwrap();

        assert_eq!(options.path, "/ws");
        assert_eq!(options.reconnection_delay, Duration::from_millis(100));
        assert_eq!(options.reconnection_attempts, Some(3));
        assert_eq!(options.query.get("room").map(String::as_str), Some("lobby"));
        assert!(options.auto_connect);
    }

    #[test]
    fn test_serialize_durations_as_millis() {
        let value = serde_json::to_value(TransportOptions::new()).unwrap();
        assert_eq!(value["reconnectionDelay"], json!(500));
        assert_eq!(value["connectTimeout"], json!(20_000));
    }
}
