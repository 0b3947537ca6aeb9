//! Synchronous cancellation tokens.
//!
//! [`AbortController`] owns the right to abort; [`AbortSignal`] is the
//! cloneable observer handed to APIs such as
//! [`ClientSocketManager::subscribe`](crate::ClientSocketManager::subscribe).
//!
//! Listeners run synchronously, exactly once, on the thread that calls
//! [`AbortController::abort`], and never under the signal's lock. A listener
//! registration is detached when its [`AbortRegistration`] is dropped, so a
//! consumer that tears down early leaves nothing behind on the signal.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use socket_client_manager::AbortController;
//!
//! let controller = AbortController::new();
//! let fired = Arc::new(AtomicBool::new(false));
//!
//! let flag = Arc::clone(&fired);
//! let registration = controller.signal().register(move || flag.store(true, Ordering::SeqCst));
//! assert!(registration.is_some());
//!
//! controller.abort();
//! assert!(fired.load(Ordering::SeqCst));
//! assert!(controller.signal().aborted());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::identifiers::ListenerId;

// ============================================================================
// Types
// ============================================================================

/// Callback run when the signal aborts.
type AbortCallback = Box<dyn FnOnce() + Send>;

/// Shared signal state.
#[derive(Default)]
struct SignalState {
    aborted: bool,
    listeners: Vec<(ListenerId, AbortCallback)>,
}

// ============================================================================
// AbortSignal
// ============================================================================

/// Observer side of a cancellation token.
#[derive(Clone, Default)]
pub struct AbortSignal {
    state: Arc<Mutex<SignalState>>,
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AbortSignal")
            .field("aborted", &state.aborted)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl AbortSignal {
    /// Returns a signal that is already aborted.
    #[must_use]
    pub fn aborted_signal() -> Self {
        let signal = Self::default();
        signal.state.lock().aborted = true;
        signal
    }

    /// Returns `true` once the owning controller aborted.
    #[inline]
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Registers `on_abort` to run when the signal aborts.
    ///
    /// Returns `None` without storing the callback if the signal is already
    /// aborted. Dropping the returned registration detaches the callback.
    #[must_use = "dropping the registration detaches the listener"]
    pub fn register<F>(&self, on_abort: F) -> Option<AbortRegistration>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();

        if state.aborted {
            return None;
        }

        let id = ListenerId::next();
        state.listeners.push((id, Box::new(on_abort)));

        Some(AbortRegistration {
            id,
            state: Arc::downgrade(&self.state),
        })
    }

    /// Returns the number of attached listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Marks the signal aborted and runs every listener once.
    fn abort(&self) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            if state.aborted {
                return false;
            }
            state.aborted = true;
            mem::take(&mut state.listeners)
        };

        trace!(listeners = listeners.len(), "Signal aborted");

        for (_, on_abort) in listeners {
            on_abort();
        }

        true
    }
}

// ============================================================================
// AbortRegistration
// ============================================================================

/// Handle to a listener attached to an [`AbortSignal`].
///
/// Holds only a weak reference to the signal.
pub struct AbortRegistration {
    id: ListenerId,
    state: Weak<Mutex<SignalState>>,
}

impl fmt::Debug for AbortRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortRegistration")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl AbortRegistration {
    /// Detaches the listener; returns `true` if it was still attached.
    pub fn unregister(mut self) -> bool {
        self.detach()
    }

    fn detach(&mut self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        self.state = Weak::new();

        let mut state = state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(id, _)| *id != self.id);
        state.listeners.len() != before
    }
}

impl Drop for AbortRegistration {
    fn drop(&mut self) {
        self.detach();
    }
}

// ============================================================================
// AbortController
// ============================================================================

/// Owner side of a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Creates a controller with a fresh signal.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the controller's signal.
    #[inline]
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Aborts the signal; returns `false` if it was already aborted.
    pub fn abort(&self) -> bool {
        self.signal.abort()
    }
}

// ============================================================================
// Tests
// ============================================================================
