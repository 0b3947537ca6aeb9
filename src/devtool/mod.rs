//! Developer-tool state projector.
//!
//! An optional diagnostic overlay reflecting the current connection status,
//! the subscribed channels and a capped log history. The manager feeds it on
//! every lifecycle event when `devtool` is enabled in its options.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Devtool`] | Projector with a single `render(mutator)` entrypoint |
//! | [`DevtoolState`] | Status, channel set and log queue |
//! | [`FixedQueue`] | Bounded FIFO used for the log history |
//! | [`Frame`] | Rendered presentation of the state |

// ============================================================================
// Submodules
// ============================================================================

/// Projector lifecycle and mutation entrypoint.
pub mod projector;

/// Bounded FIFO queue.
pub mod queue;

/// Frame composition.
pub mod render;

/// Projected state model.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use projector::Devtool;
pub use queue::FixedQueue;
pub use render::{DEFAULT_Z_INDEX, Frame, LogLine, PANEL_TITLE, Presentation, StatusLine};
pub use state::{ChannelSet, DevtoolState, LOG_CAPACITY, Log, LogType, Status, StatusColor};
