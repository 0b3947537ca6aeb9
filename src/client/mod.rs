//! Client-facing manager and its collaborators.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `manager` | [`ClientSocketManager`] lifecycle |
//! | `subscription` | Channel subscriptions on the manager |
//! | `bridge` | Transport event to handler translation |
//! | `registry` | Subscription bookkeeping |
//! | `handlers` | [`EventHandlers`] table |
//! | `options` | [`ClientSocketManagerOptions`] |
//! | `visibility` | Page visibility source |
//! | `stub` | [`ClientSocketManagerStub`] |

// ============================================================================
// Submodules
// ============================================================================

mod bridge;
mod registry;

/// Handler table.
pub mod handlers;

/// Connection lifecycle manager.
pub mod manager;

/// Manager options.
pub mod options;

/// No-op manager.
pub mod stub;

/// Channel subscriptions.
pub mod subscription;

/// Page visibility.
pub mod visibility;

// ============================================================================
// Re-exports
// ============================================================================

pub use handlers::{
    AttemptHandler, ChannelHandler, DisconnectHandler, ErrorHandler, EventHandlers,
    LifecycleHandler, MessageHandler,
};
pub use manager::ClientSocketManager;
pub use options::{ClientSocketManagerOptions, DevtoolOptions};
pub use stub::{ClientSocketManagerStub, STUB_SESSION_ID, StubEventHandlers};
pub use subscription::SubscribeOptions;
pub use visibility::{ManualVisibility, VisibilityListener, VisibilitySource, VisibilityState};
