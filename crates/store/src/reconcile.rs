//! Per-topic reconciler handlers.
//!
//! Every handler decodes its whole payload before touching the view, so a
//! payload of the wrong shape leaves the view exactly as it was.

use chrono::{DateTime, Utc};
use loxsi_core::payload::decode;
use loxsi_core::{topics, ActiveSource, Feed, PayloadError, Source, TeamCount};
use serde_json::Value;
use tracing::debug;

use crate::state::CONNECTING;
use crate::view::{Color, SourceControl, SourceKind, TextSlot, Theme, View};

pub const FROZEN_YES: &str = "Frozen: Yes";
pub const FROZEN_NO: &str = "Frozen: No";

/// Offset added to freeze timestamps before display (UTC rendering shifted to CEST).
pub const FREEZE_DISPLAY_OFFSET_MS: i64 = 2 * 60 * 60 * 1000;

/// Bar height in percent of the payload maximum.
pub fn height_pct(count: u64, divisor: u64) -> f64 {
    (count as f64 / divisor.max(1) as f64) * 100.0
}

/// Full-scan maximum, or 1 when the payload is empty or all zero.
pub fn chart_divisor(counts: &[TeamCount]) -> u64 {
    counts.iter().map(|c| c.count).max().filter(|&m| m > 0).unwrap_or(1)
}

pub fn apply_counts<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    let mut counts: Vec<TeamCount> = decode(topics::COUNTS, data)?;
    let divisor = chart_divisor(&counts);
    // stable: duplicate ids keep payload order, so the last one wins
    counts.sort_by_key(|c| c.team.id);
    for c in &counts {
        if !view.has_bar(c.team.id) {
            let color = Color::for_ordinal(view.bar_count());
            view.create_bar(c.team.id, &c.team.name, color);
        }
        view.update_bar(c.team.id, height_pct(c.count, divisor), c.count);
    }
    debug!(entries = counts.len(), divisor, bars = view.bar_count(), "chart reconciled");
    Ok(())
}

pub fn apply_message<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    let text = match data {
        Value::Null => "",
        Value::String(s) => s.as_str(),
        other => {
            return Err(PayloadError::shape(topics::MESSAGE, format!("expected string or null, got {other}")))
        }
    };
    view.set_text(TextSlot::Message, text);
    Ok(())
}

pub fn apply_frozen<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    let frozen: bool = decode(topics::FROZEN, data)?;
    view.set_text(TextSlot::Frozen, if frozen { FROZEN_YES } else { FROZEN_NO });
    Ok(())
}

/// Server asked clients to start over; the chart session ends here.
pub fn apply_refresh<V: View + ?Sized>(_data: &Value, view: &mut V) -> Result<(), PayloadError> {
    view.reset_chart();
    Ok(())
}

pub fn apply_health<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    let theme = if data.as_str() == Some("bad") { Theme::Alert } else { Theme::Normal };
    view.set_theme(theme);
    Ok(())
}

fn apply_active<V: View + ?Sized>(
    topic: &str,
    slot: TextSlot,
    data: &Value,
    view: &mut V,
) -> Result<(), PayloadError> {
    let active: ActiveSource = decode(topic, data)?;
    view.set_text(slot, &active.name);
    Ok(())
}

pub fn apply_active_source<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    apply_active(topics::ACTIVE_SOURCE, TextSlot::ActiveSource, data, view)
}

pub fn apply_active_lap_source<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    apply_active(topics::ACTIVE_LAP_SOURCE, TextSlot::ActiveLapSource, data, view)
}

pub fn apply_active_position_source<V: View + ?Sized>(
    data: &Value,
    view: &mut V,
) -> Result<(), PayloadError> {
    apply_active(topics::ACTIVE_POSITION_SOURCE, TextSlot::ActivePositionSource, data, view)
}

fn apply_sources<V: View + ?Sized>(
    topic: &str,
    kind: SourceKind,
    data: &Value,
    view: &mut V,
) -> Result<(), PayloadError> {
    let sources: Vec<Source> = decode(topic, data)?;
    let controls = sources.into_iter().map(|s| SourceControl { id: s.id, label: s.name }).collect();
    view.set_sources(kind, controls);
    Ok(())
}

pub fn apply_lap_sources<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    apply_sources(topics::LAP_SOURCE, SourceKind::Lap, data, view)
}

pub fn apply_position_sources<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    apply_sources(topics::POSITION_SOURCE, SourceKind::Position, data, view)
}

pub fn apply_connections<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    let count: i64 = decode(topics::ACTIVE_CONNECTIONS, data)?;
    view.set_text(TextSlot::ActiveConnections, &format!("Count: {count}"));
    Ok(())
}

/// `epoch_ms` shifted by [`FREEZE_DISPLAY_OFFSET_MS`] as `YYYY-MM-DDTHH:MM`.
pub fn format_freeze_time(epoch_ms: i64) -> Option<String> {
    let shifted = epoch_ms.checked_add(FREEZE_DISPLAY_OFFSET_MS)?;
    let dt: DateTime<Utc> = DateTime::from_timestamp_millis(shifted)?;
    Some(dt.format("%Y-%m-%dT%H:%M").to_string())
}

pub fn apply_freeze<V: View + ?Sized>(data: &Value, view: &mut V) -> Result<(), PayloadError> {
    if data.is_null() {
        view.set_text(TextSlot::FreezeTime, "");
        return Ok(());
    }
    let epoch_ms: i64 = decode(topics::FREEZE, data)?;
    let text = format_freeze_time(epoch_ms)
        .ok_or_else(|| PayloadError::shape(topics::FREEZE, format!("timestamp {epoch_ms} out of range")))?;
    view.set_text(TextSlot::FreezeTime, &text);
    Ok(())
}

/// Placeholders shown when a feed (re)connects, before the server replays its state.
pub fn connected<V: View + ?Sized>(feed: Feed, view: &mut V) {
    match feed {
        Feed::Public => view.set_text(TextSlot::ChartStatus, ""),
        Feed::Admin => {
            view.set_text(TextSlot::ActiveSource, CONNECTING);
            view.set_text(TextSlot::ActiveConnections, CONNECTING);
            view.set_sources(SourceKind::Lap, Vec::new());
            view.set_sources(SourceKind::Position, Vec::new());
        }
    }
}
