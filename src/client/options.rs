//! Client socket manager configuration.
//!
//! Wraps the [`TransportOptions`] handed to the connector together with the
//! manager-only settings: event handlers, devtool and visibility source.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use socket_client_manager::{ClientSocketManagerOptions, DevtoolOptions, EventHandlers};
//!
//! let options = ClientSocketManagerOptions::new()
//!     .with_path("/realtime")
//!     .with_reconnection_delay(Duration::from_millis(250))
//!     .with_event_handlers(EventHandlers::new().with_init(|_| {}))
//!     .with_devtool(DevtoolOptions::enabled());
//!
//! assert!(options.validate().is_ok());
//! assert_eq!(options.transport.path, "/realtime");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::devtool::{DEFAULT_Z_INDEX, Devtool};
use crate::error::Result;
use crate::transport::TransportOptions;

use super::handlers::EventHandlers;
use super::visibility::VisibilitySource;

// ============================================================================
// DevtoolOptions
// ============================================================================

/// Devtool overlay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DevtoolOptions {
    /// Whether the manager activates a devtool.
    pub enabled: bool,
    /// Stacking order of the overlay.
    pub z_index: i32,
}

impl Default for DevtoolOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            z_index: DEFAULT_Z_INDEX,
        }
    }
}

impl DevtoolOptions {
    /// Creates enabled devtool options.
    #[inline]
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Sets the stacking order.
    #[inline]
    #[must_use]
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }
}

// ============================================================================
// ClientSocketManagerOptions
// ============================================================================

/// Options for [`ClientSocketManager`](super::ClientSocketManager).
#[derive(Clone, Default)]
pub struct ClientSocketManagerOptions {
    /// Options handed to the transport connector.
    pub transport: TransportOptions,

    /// Lifecycle event handlers.
    pub event_handlers: EventHandlers,

    /// Devtool settings, used when no shared devtool is given.
    pub devtool: DevtoolOptions,

    /// Devtool shared with other components; takes precedence over
    /// [`devtool`](Self::devtool).
    pub shared_devtool: Option<Arc<Devtool>>,

    /// Page visibility source.
    pub visibility: Option<Arc<dyn VisibilitySource>>,
}

impl fmt::Debug for ClientSocketManagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSocketManagerOptions")
            .field("transport", &self.transport)
            .field("event_handlers", &self.event_handlers)
            .field("devtool", &self.devtool)
            .field("shared_devtool", &self.shared_devtool.is_some())
            .field("visibility", &self.visibility.is_some())
            .finish()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientSocketManagerOptions {
    /// Creates options with the default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientSocketManagerOptions {
    /// Replaces the transport options.
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the endpoint path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.transport.path = path.into();
        self
    }

    /// Enables or disables transport reconnection.
    #[inline]
    #[must_use]
    pub fn with_reconnection(mut self, reconnection: bool) -> Self {
        self.transport.reconnection = reconnection;
        self
    }

    /// Limits the number of reconnection attempts.
    #[inline]
    #[must_use]
    pub fn with_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.transport.reconnection_attempts = Some(attempts);
        self
    }

    /// Sets the initial reconnection delay.
    #[inline]
    #[must_use]
    pub fn with_reconnection_delay(mut self, delay: Duration) -> Self {
        self.transport.reconnection_delay = delay;
        self
    }

    /// Sets the reconnection delay cap.
    #[inline]
    #[must_use]
    pub fn with_reconnection_delay_max(mut self, delay: Duration) -> Self {
        self.transport.reconnection_delay_max = delay;
        self
    }

    /// Enables or disables connecting on construction.
    #[inline]
    #[must_use]
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.transport.auto_connect = auto_connect;
        self
    }

    /// Adds a query parameter to the connection request.
    #[inline]
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport.query.insert(key.into(), value.into());
        self
    }

    /// Sets the event handlers.
    #[inline]
    #[must_use]
    pub fn with_event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Sets the devtool settings.
    #[inline]
    #[must_use]
    pub fn with_devtool(mut self, devtool: DevtoolOptions) -> Self {
        self.devtool = devtool;
        self
    }

    /// Uses a devtool shared with other components.
    #[inline]
    #[must_use]
    pub fn with_shared_devtool(mut self, devtool: Arc<Devtool>) -> Self {
        self.shared_devtool = Some(devtool);
        self
    }

    /// Sets the page visibility source.
    #[inline]
    #[must_use]
    pub fn with_visibility(mut self, source: Arc<dyn VisibilitySource>) -> Self {
        self.visibility = Some(source);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientSocketManagerOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the transport
    /// options are inconsistent.
    pub fn validate(&self) -> Result<()> {
        self.transport.validate()
    }

    /// Resolves the devtool the manager should drive, if any.
    pub(crate) fn resolve_devtool(&self) -> Option<Arc<Devtool>> {
        match (&self.shared_devtool, self.devtool.enabled) {
            (Some(shared), _) => Some(Arc::clone(shared)),
            (None, true) => Some(Arc::new(Devtool::with_z_index(self.devtool.z_index))),
            (None, false) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
