#![forbid(unsafe_code)]

use loxsi_core::TeamId;
use loxsi_store::reconcile::{apply_counts, apply_frozen, apply_refresh};
use loxsi_store::{Color, DashboardState, TextSlot};
use serde_json::{json, Value};

fn counts(entries: &[(i64, &str, u64)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(id, name, count)| json!({ "team": { "id": id, "name": name }, "count": count }))
            .collect(),
    )
}

fn height(v: &DashboardState, id: i64) -> f64 {
    v.bar(TeamId(id)).expect("bar exists").height_pct
}

#[test]
fn heights_are_relative_to_payload_maximum() {
    let mut v = DashboardState::new();
    apply_counts(&counts(&[(1, "A", 5), (2, "B", 10)]), &mut v).unwrap();
    assert_eq!(height(&v, 1), 50.0);
    assert_eq!(height(&v, 2), 100.0);
    assert_eq!(v.bar(TeamId(1)).unwrap().value, 5);

    apply_counts(&counts(&[(1, "A", 0), (2, "B", 0)]), &mut v).unwrap();
    assert_eq!(height(&v, 1), 0.0);
    assert_eq!(height(&v, 2), 0.0);
    assert!(v.bars.iter().all(|b| !b.height_pct.is_nan()));
}

#[test]
fn heights_stay_within_bounds() {
    let mut v = DashboardState::new();
    let payload = counts(&[(3, "C", 7), (1, "A", 0), (9, "I", 13), (4, "D", 13), (2, "B", 1)]);
    apply_counts(&payload, &mut v).unwrap();
    for bar in &v.bars {
        assert!((0.0..=100.0).contains(&bar.height_pct), "bar {} height {}", bar.id, bar.height_pct);
        let expected = 100.0 * bar.value as f64 / 13.0;
        assert!((bar.height_pct - expected).abs() < 1e-9, "bar {} height {}", bar.id, bar.height_pct);
    }
}

#[test]
fn empty_payload_is_a_noop() {
    let mut v = DashboardState::new();
    apply_counts(&json!([]), &mut v).unwrap();
    assert!(v.bars.is_empty());
}

#[test]
fn repeated_payload_is_idempotent() {
    let payload = counts(&[(2, "B", 3), (1, "A", 6)]);
    let mut v = DashboardState::new();
    apply_counts(&payload, &mut v).unwrap();
    let first = v.clone();
    apply_counts(&payload, &mut v).unwrap();
    assert_eq!(first, v);
}

#[test]
fn bars_are_created_in_id_order_and_never_removed() {
    let mut v = DashboardState::new();
    apply_counts(&counts(&[(3, "C", 1), (1, "A", 1)]), &mut v).unwrap();
    apply_counts(&counts(&[(2, "B", 4)]), &mut v).unwrap();
    let ids: Vec<i64> = v.bars.iter().map(|b| b.id.0).collect();
    assert_eq!(ids, vec![1, 3, 2]);
    // teams missing from the latest payload keep their previous rendering
    assert_eq!(height(&v, 1), 100.0);
    assert_eq!(height(&v, 2), 100.0);
    assert_eq!(v.bar(TeamId(3)).unwrap().legend, "C");
}

#[test]
fn colors_follow_first_seen_order_modulo_palette() {
    let mut v = DashboardState::new();
    let first: Vec<(i64, &str, u64)> = (1..=5).map(|i: i64| (i, "t", 100 - i as u64)).collect();
    apply_counts(&counts(&first), &mut v).unwrap();
    let second: Vec<(i64, &str, u64)> = (1..=9).map(|i| (i, "t", 0)).collect();
    apply_counts(&counts(&second), &mut v).unwrap();
    for (ordinal, bar) in v.bars.iter().enumerate() {
        assert_eq!(bar.color, Color::for_ordinal(ordinal));
    }
    assert_eq!(v.bar(TeamId(8)).unwrap().color, Color::Blue);
    assert_eq!(v.bar(TeamId(9)).unwrap().color, Color::Green);
}

#[test]
fn duplicate_ids_in_one_payload_last_write_wins() {
    let mut v = DashboardState::new();
    apply_counts(&counts(&[(1, "A", 2), (2, "B", 8), (1, "A", 4)]), &mut v).unwrap();
    assert_eq!(v.bars.len(), 2);
    assert_eq!(v.bar(TeamId(1)).unwrap().value, 4);
    assert_eq!(height(&v, 1), 50.0);
}

#[test]
fn malformed_counts_leave_view_untouched() {
    let mut v = DashboardState::new();
    apply_counts(&counts(&[(1, "A", 2)]), &mut v).unwrap();
    let before = v.clone();
    assert!(apply_counts(&json!({ "team": 1 }), &mut v).is_err());
    assert!(apply_counts(&json!([{ "team": { "id": 2, "name": "B" }, "count": 1 }, { "count": 3 }]), &mut v).is_err());
    assert_eq!(before, v);
}

#[test]
fn frozen_flag_renders_fixed_strings() {
    let mut v = DashboardState::new();
    apply_frozen(&json!(true), &mut v).unwrap();
    assert_eq!(v.text(TextSlot::Frozen), "Frozen: Yes");
    apply_frozen(&json!(false), &mut v).unwrap();
    assert_eq!(v.text(TextSlot::Frozen), "Frozen: No");
    assert!(apply_frozen(&json!("yes"), &mut v).is_err());
    assert_eq!(v.text(TextSlot::Frozen), "Frozen: No");
}

#[test]
fn refresh_starts_a_new_color_session() {
    let mut v = DashboardState::new();
    apply_counts(&counts(&[(1, "A", 1), (2, "B", 1)]), &mut v).unwrap();
    apply_refresh(&json!(true), &mut v).unwrap();
    apply_counts(&counts(&[(2, "B", 1)]), &mut v).unwrap();
    assert_eq!(v.bars.len(), 1);
    assert_eq!(v.bar(TeamId(2)).unwrap().color, Color::Blue);
}
