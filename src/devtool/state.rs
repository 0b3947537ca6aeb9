//! Devtool state model.
//!
//! The projected connection status, the set of subscribed channels and the
//! capped log history.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::queue::FixedQueue;

// ============================================================================
// Constants
// ============================================================================

/// Log slots of a fresh [`DevtoolState`].
const LOG_SLOTS: NonZeroUsize = NonZeroUsize::new(20).unwrap();

/// Number of log entries retained by the devtool.
pub const LOG_CAPACITY: usize = LOG_SLOTS.get();

// ============================================================================
// StatusColor
// ============================================================================

/// Palette used for status dots and log titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    /// Healthy.
    Green,
    /// Failed or closed.
    Red,
    /// In progress.
    Yellow,
    /// Unknown.
    Grey,
}

impl StatusColor {
    /// Returns the CSS hex value.
    #[inline]
    #[must_use]
    pub const fn hex(&self) -> &'static str {
        match self {
            Self::Green => "#3fb950",
            Self::Red => "#f85149",
            Self::Yellow => "#d29922",
            Self::Grey => "#656c7699",
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Connection status shown by the devtool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// No lifecycle event seen yet.
    #[default]
    Unknown,
    /// Socket connected.
    Connected,
    /// Socket disconnected.
    Disconnected,
    /// Reconnection attempt in progress.
    Reconnecting,
}

impl Status {
    /// Every status, in display order.
    pub const ALL: [Self; 4] = [
        Self::Reconnecting,
        Self::Connected,
        Self::Disconnected,
        Self::Unknown,
    ];

    /// Returns the status label.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Reconnecting => "RECONNECTING",
        }
    }

    /// Returns the indicator color.
    #[inline]
    #[must_use]
    pub const fn color(&self) -> StatusColor {
        match self {
            Self::Unknown => StatusColor::Grey,
            Self::Connected => StatusColor::Green,
            Self::Disconnected => StatusColor::Red,
            Self::Reconnecting => StatusColor::Yellow,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LogType
// ============================================================================

/// Kind of a devtool log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    /// Reconnected after one or more attempts.
    SuccessfulReconnection,
    /// Gave up reconnecting.
    ReconnectionFailure,
    /// Reconnection attempt started.
    Reconnecting,
    /// Manager-level connection error.
    ConnectionError,
    /// Reconnection attempt failed.
    ReconnectingError,
    /// Channel subscribed.
    Subscribed,
    /// Channel unsubscribed.
    Unsubscribed,
    /// Manual connect requested.
    Connected,
    /// Manual disconnect requested.
    Disconnected,
}

impl LogType {
    /// Returns the log title.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SuccessfulReconnection => "SUCCESSFUL_RECONNECTION",
            Self::ReconnectionFailure => "RECONNECTION_FAILURE",
            Self::Reconnecting => "RECONNECTING",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::ReconnectingError => "RECONNECTING_ERROR",
            Self::Subscribed => "SUBSCRIBED",
            Self::Unsubscribed => "UNSUBSCRIBED",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    /// Returns the title color.
    #[must_use]
    pub const fn color(&self) -> StatusColor {
        match self {
            Self::SuccessfulReconnection | Self::Subscribed | Self::Connected => {
                StatusColor::Green
            }
            Self::Reconnecting => StatusColor::Yellow,
            Self::ReconnectionFailure
            | Self::ConnectionError
            | Self::ReconnectingError
            | Self::Unsubscribed
            | Self::Disconnected => StatusColor::Red,
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log
// ============================================================================

/// A single immutable devtool log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Log {
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: LogType,
    /// When the entry was recorded.
    pub date: DateTime<Utc>,
    /// Free-form detail line.
    pub detail: String,
}

impl Log {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(kind: LogType, detail: impl Into<String>) -> Self {
        Self {
            kind,
            date: Utc::now(),
            detail: detail.into(),
        }
    }
}

// ============================================================================
// ChannelSet
// ============================================================================

/// Set of channel names that keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChannelSet(Vec<String>);

impl ChannelSet {
    /// Adds a channel; returns `false` if it was already present.
    pub fn insert(&mut self, channel: impl Into<String>) -> bool {
        let channel = channel.into();
        if self.contains(&channel) {
            return false;
        }
        self.0.push(channel);
        true
    }

    /// Removes a channel; returns `true` if it was present.
    pub fn remove(&mut self, channel: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c != channel);
        self.0.len() != before
    }

    /// Returns `true` if the channel is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.0.iter().any(|c| c == channel)
    }

    /// Iterates over the channels in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of channels.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no channels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes every channel.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

// ============================================================================
// DevtoolState
// ============================================================================

/// Mutable state projected by the devtool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevtoolState {
    /// Current connection status.
    pub status: Status,
    /// Currently subscribed channels.
    pub channels: ChannelSet,
    /// Capped log history.
    pub logs: FixedQueue<Log>,
}

impl DevtoolState {
    /// Creates an empty state with [`LOG_CAPACITY`] log slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: Status::Unknown,
            channels: ChannelSet::default(),
            logs: FixedQueue::with_max_length(LOG_SLOTS),
        }
    }

    /// Appends a log entry stamped now.
    #[inline]
    pub fn log(&mut self, kind: LogType, detail: impl Into<String>) {
        self.logs.enqueue(Log::new(kind, detail));
    }

    /// Resets status, channels and logs.
    pub fn reset(&mut self) {
        self.status = Status::Unknown;
        self.channels.clear();
        self.logs.clear();
    }
}

impl Default for DevtoolState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
