//! Devtool projector.
//!
//! Holds the projected [`DevtoolState`] behind a single mutation entrypoint
//! ([`Devtool::render`]) and keeps the rendered [`Frame`] in sync with it.
//!
//! The projector is caller-owned and shared through `Arc`. Exactly one owner
//! (identified by a [`Uuid`], normally a manager instance) may have it active
//! at a time; other owners are refused with a warning.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::render::{DEFAULT_Z_INDEX, Frame, Presentation};
use super::state::DevtoolState;

// ============================================================================
// Types
// ============================================================================

/// Internal mutable state.
struct DevtoolInner {
    /// Projected state.
    state: DevtoolState,
    /// Owner that activated the projector.
    owner: Option<Uuid>,
    /// Presentation-only settings.
    presentation: Presentation,
    /// Rendered surface; `None` while inactive.
    surface: Option<Frame>,
}

impl DevtoolInner {
    fn refresh(&mut self) {
        self.surface = Some(Frame::compose(&self.state, self.presentation));
        trace!(
            status = self.state.status.as_str(),
            channels = self.state.channels.len(),
            logs = self.state.logs.len(),
            "Devtool rendered"
        );
    }
}

// ============================================================================
// Devtool
// ============================================================================

/// Observable projection of a manager's connection state.
///
/// # Example
///
/// ```
/// use socket_client_manager::devtool::{Devtool, LogType, Status};
/// use uuid::Uuid;
///
/// let devtool = Devtool::new();
/// let owner = Uuid::new_v4();
/// devtool.init(owner);
///
/// devtool.render(|s| {
///     s.status = Status::Connected;
///     s.log(LogType::Connected, "socket was connected manually");
/// });
///
/// let frame = devtool.frame().expect("active devtool has a frame");
/// assert_eq!(frame.status.label, "CONNECTED");
/// ```
pub struct Devtool {
    inner: Mutex<DevtoolInner>,
}

impl fmt::Debug for Devtool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Devtool")
            .field("owner", &inner.owner)
            .field("status", &inner.state.status)
            .field("expanded", &inner.presentation.expanded)
            .finish_non_exhaustive()
    }
}

impl Default for Devtool {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Devtool - Constructors
// ============================================================================

impl Devtool {
    /// Creates an inactive projector.
    #[must_use]
    pub fn new() -> Self {
        Self::with_z_index(DEFAULT_Z_INDEX)
    }

    /// Creates an inactive projector with a custom stacking order.
    #[must_use]
    pub fn with_z_index(z_index: i32) -> Self {
        Self {
            inner: Mutex::new(DevtoolInner {
                state: DevtoolState::new(),
                owner: None,
                presentation: Presentation {
                    z_index,
                    expanded: true,
                },
                surface: None,
            }),
        }
    }
}

// ============================================================================
// Devtool - Lifecycle
// ============================================================================

impl Devtool {
    /// Activates the projector for `owner` and renders the first frame.
    ///
    /// Re-initializing with the same owner is a no-op. Returns `false` when
    /// another owner already holds the projector.
    pub fn init(&self, owner: Uuid) -> bool {
        let mut inner = self.inner.lock();
        let current_owner = inner.owner;

        match current_owner {
            Some(current) if current == owner => true,
            Some(current) => {
                warn!(%current, requested = %owner, "Devtool is already active for another client");
                false
            }
            None => {
                inner.owner = Some(owner);
                inner.refresh();
                debug!(%owner, "Devtool activated");
                true
            }
        }
    }

    /// Deactivates the projector and removes the rendered surface.
    ///
    /// Only the owner that activated it may dispose it. The projected state
    /// is reset so the next owner starts from a clean slate.
    pub fn dispose(&self, owner: Uuid) -> bool {
        let mut inner = self.inner.lock();

        if inner.owner != Some(owner) {
            return false;
        }

        inner.owner = None;
        inner.surface = None;
        inner.state.reset();
        debug!(%owner, "Devtool disposed");
        true
    }

    /// Returns `true` while an owner holds the projector.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lock().owner.is_some()
    }

    /// Returns the current owner.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> Option<Uuid> {
        self.inner.lock().owner
    }
}

// ============================================================================
// Devtool - Mutation
// ============================================================================

impl Devtool {
    /// Applies `mutator` to the shared state and refreshes the surface.
    ///
    /// No-op while inactive; returns whether the mutator ran. The mutator
    /// runs under the projector's lock and must not call back into it.
    pub fn render<F>(&self, mutator: F) -> bool
    where
        F: FnOnce(&mut DevtoolState),
    {
        let mut inner = self.inner.lock();

        if inner.owner.is_none() {
            return false;
        }

        mutator(&mut inner.state);
        inner.refresh();
        true
    }

    /// Applies `mutator` even while inactive.
    ///
    /// The surface is refreshed only if the projector is active.
    pub fn force_render<F>(&self, mutator: F)
    where
        F: FnOnce(&mut DevtoolState),
    {
        let mut inner = self.inner.lock();
        mutator(&mut inner.state);

        if inner.owner.is_some() {
            inner.refresh();
        }
    }

    /// Re-renders the surface from the current state.
    pub fn refresh(&self) {
        let mut inner = self.inner.lock();

        if inner.owner.is_some() {
            inner.refresh();
        }
    }

    /// Returns a copy of the projected state.
    #[must_use]
    pub fn snapshot(&self) -> DevtoolState {
        self.inner.lock().state.clone()
    }

    /// Returns the rendered surface, `None` while inactive.
    #[must_use]
    pub fn frame(&self) -> Option<Frame> {
        self.inner.lock().surface.clone()
    }
}

// ============================================================================
// Devtool - Presentation
// ============================================================================

impl Devtool {
    /// Expands the info panel.
    pub fn show(&self) {
        self.set_expanded(true);
    }

    /// Collapses the info panel.
    pub fn hide(&self) {
        self.set_expanded(false);
    }

    /// Flips the info panel between expanded and collapsed.
    pub fn toggle(&self) {
        let expanded = !self.is_expanded();
        self.set_expanded(expanded);
    }

    /// Returns `true` if the info panel is expanded.
    #[inline]
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.inner.lock().presentation.expanded
    }

    /// Returns the presentation settings.
    #[inline]
    #[must_use]
    pub fn presentation(&self) -> Presentation {
        self.inner.lock().presentation
    }

    /// Changes the stacking order of the overlay.
    pub fn set_z_index(&self, z_index: i32) {
        let mut inner = self.inner.lock();
        inner.presentation.z_index = z_index;

        if inner.owner.is_some() {
            inner.refresh();
        }
    }

    fn set_expanded(&self, expanded: bool) {
        let mut inner = self.inner.lock();
        inner.presentation.expanded = expanded;

        if inner.owner.is_some() {
            inner.refresh();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
