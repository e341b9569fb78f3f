//! Plain-text rendering of a dashboard snapshot.

use std::fmt::Write as _;

use loxsi_core::Feed;
use loxsi_store::{DashboardState, SourceControl, TextSlot, Theme};

const BAR_WIDTH: usize = 30;

fn bar_cells(height_pct: f64) -> usize {
    let cells = (height_pct.clamp(0.0, 100.0) / 100.0 * BAR_WIDTH as f64).round();
    cells as usize
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn sources_line(label: &str, sources: &[SourceControl]) -> String {
    let items: Vec<String> = sources.iter().map(|s| format!("{}={}", s.id, s.label)).collect();
    format!("{label}: {}", if items.is_empty() { "-".to_string() } else { items.join(", ") })
}

/// Render the parts of `state` owned by `feeds`.
pub fn human(state: &DashboardState, feeds: &[Feed]) -> String {
    let mut out = String::new();
    if feeds.contains(&Feed::Public) {
        let status = state.text(TextSlot::ChartStatus);
        let _ = writeln!(out, "chart: {}", if status.is_empty() { "live" } else { status });
        let _ = writeln!(out, "{}", or_dash(state.text(TextSlot::Frozen)));
        let _ = writeln!(out, "message: {}", or_dash(state.text(TextSlot::Message)));
        let legend_w = state.bars.iter().map(|b| b.legend.chars().count()).max().unwrap_or(0);
        for bar in &state.bars {
            let cells = bar_cells(bar.height_pct);
            let _ = writeln!(
                out,
                "  {:<legend_w$} |{}{}| {:>5.1}% {:>6} {}",
                bar.legend,
                "#".repeat(cells),
                " ".repeat(BAR_WIDTH - cells),
                bar.height_pct,
                bar.value,
                bar.color.as_str(),
            );
        }
    }
    if feeds.contains(&Feed::Admin) {
        let health = match state.theme {
            Theme::Normal => "ok",
            Theme::Alert => "BAD",
        };
        let _ = writeln!(out, "health: {health}");
        let _ = writeln!(out, "active source: {}", or_dash(state.text(TextSlot::ActiveSource)));
        let _ = writeln!(out, "active lap source: {}", or_dash(state.text(TextSlot::ActiveLapSource)));
        let _ = writeln!(out, "active position source: {}", or_dash(state.text(TextSlot::ActivePositionSource)));
        let _ = writeln!(out, "{}", sources_line("lap sources", &state.lap_sources));
        let _ = writeln!(out, "{}", sources_line("position sources", &state.position_sources));
        let _ = writeln!(out, "connections: {}", or_dash(state.text(TextSlot::ActiveConnections)));
        let _ = writeln!(out, "freeze: {}", or_dash(state.text(TextSlot::FreezeTime)));
    }
    out
}
