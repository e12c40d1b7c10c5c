//! Tests for heatmap normalization

use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::graph::{BuildOptions, PlanGraph, build_graph};
use crate::raw::RawPlanNode;

fn build(json: &str) -> PlanGraph {
    let plan: Arc<RawPlanNode> = serde_json::from_str(json).expect("bad fixture");
    build_graph(plan, &BuildOptions::default()).expect("build failed")
}

#[test]
fn test_maxima_floor_to_one_on_all_zero_input() {
    let graph = build(r#"{"Node Type": "Result", "Plans": [{"Node Type": "Result"}]}"#);

    let maxima = HeatmapMaxima::compute(&graph.nodes);
    assert_eq!(maxima.max_time, 1.0);
    assert_eq!(maxima.max_rows, 1.0);
    assert_eq!(maxima.max_cost, 1.0);
}

#[test]
fn test_maxima_keep_small_nonzero_values() {
    let graph = build(r#"{"Node Type": "Seq Scan", "Total Cost": 0.5}"#);

    // 0.5 is a usable maximum; only a zero maximum is replaced.
    assert_eq!(HeatmapMaxima::compute(&graph.nodes).max_cost, 0.5);
}

#[test]
fn test_maxima_across_nodes() {
    let json = r#"{
        "Node Type": "Hash Join",
        "Total Cost": 100.0,
        "Actual Total Time": 50.0,
        "Actual Rows": 10,
        "Plans": [
            {
                "Node Type": "Seq Scan",
                "Total Cost": 40.0,
                "Actual Total Time": 20.0,
                "Actual Rows": 500
            }
        ]
    }"#;
    let graph = build(json);

    let maxima = HeatmapMaxima::compute(&graph.nodes);
    assert_eq!(maxima.max_time, 30.0);
    assert_eq!(maxima.max_rows, 500.0);
    assert_eq!(maxima.max_cost, 60.0);
}

#[test]
fn test_time_heat_falls_back_to_reported_total() {
    // The child's reported time exceeds the parent's, so the parent's
    // exclusive time clamps to zero and its heat comes from the total.
    let json = r#"{
        "Node Type": "Gather",
        "Actual Total Time": 50.0,
        "Plans": [{"Node Type": "Sort", "Actual Total Time": 80.0}]
    }"#;
    let graph = build(json);

    assert_eq!(
        HeatmapMode::Time.heat_value(&graph.nodes[0].data),
        Some(50.0)
    );
    assert_eq!(HeatmapMaxima::compute(&graph.nodes).max_time, 80.0);
}

#[test]
fn test_rows_heat_falls_back_to_plan_rows() {
    // Plain EXPLAIN: no actuals at all.
    let graph = build(r#"{"Node Type": "Seq Scan", "Plan Rows": 123}"#);

    assert_eq!(
        HeatmapMode::Rows.heat_value(&graph.nodes[0].data),
        Some(123.0)
    );
    assert_eq!(HeatmapMaxima::compute(&graph.nodes).max_rows, 123.0);
}

#[test]
fn test_mode_none_disables_heat() {
    let graph = build(r#"{"Node Type": "Seq Scan", "Total Cost": 10.0}"#);
    let maxima = HeatmapMaxima::compute(&graph.nodes);

    assert_eq!(HeatmapMode::None.heat_value(&graph.nodes[0].data), None);
    assert_eq!(HeatmapMode::None.intensity(&graph.nodes[0].data, &maxima), None);
}

#[test]
fn test_intensity_is_rounded_percentage() {
    let json = r#"{
        "Node Type": "Append",
        "Total Cost": 90.0,
        "Plans": [{"Node Type": "Seq Scan", "Total Cost": 30.0}]
    }"#;
    let graph = build(json);
    let maxima = HeatmapMaxima::compute(&graph.nodes);

    // Exclusive costs are 60 and 30; the child sits at half the maximum.
    assert_eq!(maxima.max_cost, 60.0);
    assert_eq!(
        HeatmapMode::Cost.intensity(&graph.nodes[0].data, &maxima),
        Some(100)
    );
    assert_eq!(
        HeatmapMode::Cost.intensity(&graph.nodes[1].data, &maxima),
        Some(50)
    );
}

#[test]
fn test_intensity_clamps_above_the_maximum() {
    let graph = build(r#"{"Node Type": "Seq Scan", "Actual Total Time": 25.0}"#);

    // Stale maxima from a smaller graph must not push intensity past 100.
    let maxima = HeatmapMaxima {
        max_time: 10.0,
        max_rows: 1.0,
        max_cost: 1.0,
    };
    assert_eq!(
        HeatmapMode::Time.intensity(&graph.nodes[0].data, &maxima),
        Some(100)
    );
}

#[test]
fn test_mode_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&HeatmapMode::Rows).unwrap(), "\"rows\"");
    let parsed: HeatmapMode = serde_json::from_str("\"time\"").unwrap();
    assert_eq!(parsed, HeatmapMode::Time);
}
