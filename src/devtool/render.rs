//! Devtool frame composition.
//!
//! A [`Frame`] is the rendered presentation of a [`DevtoolState`]: status
//! indicator, channel chips and the scrollable log list. Composition is a pure
//! function of the state and the presentation settings, so composing twice
//! without a mutation in between yields identical frames.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use chrono::SecondsFormat;
use serde::Serialize;

use super::state::{DevtoolState, StatusColor};

// ============================================================================
// Constants
// ============================================================================

/// Header shown on top of the panel.
pub const PANEL_TITLE: &str = "Client Socket Manager";

/// Default stacking order of the overlay.
pub const DEFAULT_Z_INDEX: i32 = 99_999;

// ============================================================================
// Presentation
// ============================================================================

/// Presentation-only settings; never part of the projected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Presentation {
    /// Stacking order of the overlay.
    pub z_index: i32,
    /// Whether the info panel is expanded.
    pub expanded: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            z_index: DEFAULT_Z_INDEX,
            expanded: true,
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// Status indicator section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    /// Status label.
    pub label: &'static str,
    /// Indicator color.
    pub color: StatusColor,
}

/// One rendered log item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    /// RFC 3339 timestamp.
    pub time: String,
    /// Log title.
    pub title: &'static str,
    /// Detail line.
    pub detail: String,
    /// Title color.
    pub color: StatusColor,
}

/// Rendered devtool surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Panel header.
    pub title: &'static str,
    /// Presentation settings the frame was composed with.
    pub presentation: Presentation,
    /// Status section.
    pub status: StatusLine,
    /// Channel chips; the section is omitted when empty.
    pub channels: Vec<String>,
    /// Log items, oldest first; the section is omitted when empty.
    pub logs: Vec<LogLine>,
}

impl Frame {
    /// Composes a frame from the current state.
    #[must_use]
    pub fn compose(state: &DevtoolState, presentation: Presentation) -> Self {
        let logs = state
            .logs
            .iter()
            .map(|log| LogLine {
                time: log.date.to_rfc3339_opts(SecondsFormat::Millis, true),
                title: log.kind.as_str(),
                detail: log.detail.clone(),
                color: log.kind.color(),
            })
            .collect();

        Self {
            title: PANEL_TITLE,
            presentation,
            status: StatusLine {
                label: state.status.as_str(),
                color: state.status.color(),
            },
            channels: state.channels.iter().map(str::to_owned).collect(),
            logs,
        }
    }

    /// Returns `true` if the channel section is shown.
    #[inline]
    #[must_use]
    pub fn has_channel_section(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Returns `true` if the log section is shown.
    #[inline]
    #[must_use]
    pub fn has_log_section(&self) -> bool {
        !self.logs.is_empty()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "Status: {} ({})", self.status.label, self.status.color.hex())?;

        if self.has_channel_section() {
            writeln!(f, "----")?;
            write!(f, "Channels:")?;
            for channel in &self.channels {
                write!(f, " [{channel}]")?;
            }
            writeln!(f)?;
        }

        if self.has_log_section() {
            writeln!(f, "----")?;
            for line in &self.logs {
                writeln!(f, "{} {}", line.time, line.title)?;
                writeln!(f, "  {}", line.detail)?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
