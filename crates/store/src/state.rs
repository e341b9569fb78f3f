use std::collections::BTreeMap;

use loxsi_core::TeamId;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::view::{Color, SourceControl, SourceKind, TextSlot, Theme, View};

pub const CONNECTING: &str = "Connecting...";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Bar {
    pub id: TeamId,
    pub legend: String,
    pub color: Color,
    pub height_pct: f64,
    pub value: u64,
}

/// In-memory dashboard: the reference [`View`] and the snapshot type readers see.
///
/// Bars keep creation order, which is left-to-right rendering order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardState {
    pub bars: Vec<Bar>,
    #[serde(skip)]
    index: FxHashMap<TeamId, usize>,
    pub texts: BTreeMap<TextSlot, String>,
    pub theme: Theme,
    pub lap_sources: Vec<SourceControl>,
    pub position_sources: Vec<SourceControl>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        let mut texts = BTreeMap::new();
        texts.insert(TextSlot::ChartStatus, CONNECTING.to_string());
        Self {
            bars: Vec::new(),
            index: FxHashMap::default(),
            texts,
            theme: Theme::Normal,
            lap_sources: Vec::new(),
            position_sources: Vec::new(),
        }
    }

    pub fn bar(&self, id: TeamId) -> Option<&Bar> {
        self.index.get(&id).and_then(|&i| self.bars.get(i))
    }

    /// Text of a slot; unset slots read as empty.
    pub fn text(&self, slot: TextSlot) -> &str {
        self.texts.get(&slot).map(String::as_str).unwrap_or("")
    }

    pub fn sources(&self, kind: SourceKind) -> &[SourceControl] {
        match kind {
            SourceKind::Lap => &self.lap_sources,
            SourceKind::Position => &self.position_sources,
        }
    }
}

impl View for DashboardState {
    fn has_bar(&self, id: TeamId) -> bool {
        self.index.contains_key(&id)
    }

    fn bar_count(&self) -> usize {
        self.bars.len()
    }

    fn create_bar(&mut self, id: TeamId, legend: &str, color: Color) {
        if self.index.contains_key(&id) {
            return;
        }
        self.index.insert(id, self.bars.len());
        self.bars.push(Bar { id, legend: legend.to_string(), color, height_pct: 0.0, value: 0 });
    }

    fn update_bar(&mut self, id: TeamId, height_pct: f64, value: u64) {
        if let Some(bar) = self.index.get(&id).and_then(|&i| self.bars.get_mut(i)) {
            bar.height_pct = height_pct;
            bar.value = value;
        }
    }

    fn set_text(&mut self, slot: TextSlot, text: &str) {
        match self.texts.get_mut(&slot) {
            Some(cur) if cur == text => {}
            Some(cur) => {
                cur.clear();
                cur.push_str(text);
            }
            None => {
                self.texts.insert(slot, text.to_string());
            }
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    fn set_sources(&mut self, kind: SourceKind, controls: Vec<SourceControl>) {
        match kind {
            SourceKind::Lap => self.lap_sources = controls,
            SourceKind::Position => self.position_sources = controls,
        }
    }

    fn reset_chart(&mut self) {
        self.bars.clear();
        self.index.clear();
        self.set_text(TextSlot::ChartStatus, CONNECTING);
    }
}
