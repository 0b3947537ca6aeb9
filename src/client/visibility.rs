//! Page visibility source.
//!
//! The manager reconnects when the page becomes visible and disconnects when
//! it is hidden. Hosts plug their own notion of visibility in through
//! [`VisibilitySource`]; [`ManualVisibility`] is driven by hand.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::identifiers::ListenerId;
use crate::transport::EventEmitter;

// ============================================================================
// Types
// ============================================================================

/// Visibility of the hosting page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VisibilityState {
    /// Page is shown.
    #[default]
    Visible,
    /// Page is in the background.
    Hidden,
    /// Page is being prerendered. Ignored by the manager.
    Prerender,
}

impl VisibilityState {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Prerender => "prerender",
        }
    }
}

impl fmt::Display for VisibilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility change listener.
pub type VisibilityListener = Arc<dyn Fn(VisibilityState) + Send + Sync>;

// ============================================================================
// VisibilitySource
// ============================================================================

/// Source of page visibility changes.
pub trait VisibilitySource: Send + Sync {
    /// Current visibility.
    fn state(&self) -> VisibilityState;

    /// Attaches a change listener.
    fn add_listener(&self, listener: VisibilityListener) -> ListenerId;

    /// Detaches a change listener.
    fn remove_listener(&self, id: ListenerId);
}

// ============================================================================
// ManualVisibility
// ============================================================================

/// Visibility source changed explicitly with [`set_state`](Self::set_state).
#[derive(Debug, Default)]
pub struct ManualVisibility {
    state: Mutex<VisibilityState>,
    listeners: EventEmitter<(), VisibilityState>,
}

impl ManualVisibility {
    /// Creates a source starting as [`VisibilityState::Visible`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the visibility and notifies listeners if it changed.
    pub fn set_state(&self, state: VisibilityState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            self.listeners.emit(&(), &state);
        }
    }

    /// Returns how many listeners are attached.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl VisibilitySource for ManualVisibility {
    fn state(&self) -> VisibilityState {
        *self.state.lock()
    }

    fn add_listener(&self, listener: VisibilityListener) -> ListenerId {
        self.listeners.on(
            (),
            Arc::new(move |state: &VisibilityState| listener(*state)),
        )
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.off(&(), Some(id));
    }
}

// ============================================================================
// Tests
// ============================================================================
