//! View port: the capability set reconciler handlers are allowed to use.
//!
//! Handlers never touch a rendering surface directly. Anything that can hold
//! bars, text slots, a theme flag and source lists can back a dashboard; the
//! in-memory [`crate::DashboardState`] is the reference implementation.

use loxsi_core::{SourceId, TeamId};
use serde::{Deserialize, Serialize};

/// Bar colors, assigned cyclically in bar creation order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Green,
    Cyan,
    Red,
    Purple,
    Yellow,
    Orange,
}

pub const PALETTE: [Color; 7] = [
    Color::Blue,
    Color::Green,
    Color::Cyan,
    Color::Red,
    Color::Purple,
    Color::Yellow,
    Color::Orange,
];

impl Color {
    /// Color of the `ordinal`-th bar created in a session (0-based).
    pub fn for_ordinal(ordinal: usize) -> Self {
        PALETTE[ordinal % PALETTE.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Cyan => "cyan",
            Color::Red => "red",
            Color::Purple => "purple",
            Color::Yellow => "yellow",
            Color::Orange => "orange",
        }
    }
}

/// Named text outputs of the dashboard and admin panel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TextSlot {
    /// Chart placeholder shown until the public feed is live.
    ChartStatus,
    Message,
    Frozen,
    ActiveSource,
    ActiveLapSource,
    ActivePositionSource,
    ActiveConnections,
    /// Value of the editable freeze-time input (`YYYY-MM-DDTHH:MM`).
    FreezeTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Normal,
    Alert,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lap,
    Position,
}

/// A selectable source entry; carries the id used to activate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceControl {
    pub id: SourceId,
    pub label: String,
}

pub trait View {
    fn has_bar(&self, id: TeamId) -> bool;

    /// Number of bars created so far in this session.
    fn bar_count(&self) -> usize;

    /// Append a new bar with its legend label. Callers check [`View::has_bar`] first.
    fn create_bar(&mut self, id: TeamId, legend: &str, color: Color);

    /// Set the height (percent, 0..=100) and the displayed value of an existing bar.
    fn update_bar(&mut self, id: TeamId, height_pct: f64, value: u64);

    fn set_text(&mut self, slot: TextSlot, text: &str);

    fn set_theme(&mut self, theme: Theme);

    /// Replace the whole list of selectable sources of one kind.
    fn set_sources(&mut self, kind: SourceKind, controls: Vec<SourceControl>);

    /// Drop every bar and start a new chart session.
    fn reset_chart(&mut self);
}
