//! Tests for the tree-to-graph builder

use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;

fn node(json: &str) -> Arc<RawPlanNode> {
    serde_json::from_str(json).expect("bad fixture")
}

fn build(json: &str) -> PlanGraph {
    build_graph(node(json), &BuildOptions::default()).expect("build failed")
}

fn by_id<'a>(graph: &'a PlanGraph, id: &str) -> &'a GraphNode {
    graph
        .nodes
        .iter()
        .find(|n| n.id == id)
        .unwrap_or_else(|| panic!("no node {id}"))
}

// ============================================================================
// Ids and edges
// ============================================================================

#[test]
fn test_single_node_uses_root_sentinel() {
    let graph = build(r#"{"Node Type": "Result"}"#);

    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(graph.nodes[0].id, ROOT_ID);
    assert!(graph.edges.is_empty());
}

#[test]
fn test_ids_follow_parent_and_child_index() {
    // Depth 3, two children at every level.
    let json = r#"{
        "Node Type": "Append",
        "Plans": [
            {"Node Type": "Sort", "Plans": [
                {"Node Type": "Seq Scan"},
                {"Node Type": "Seq Scan"}
            ]},
            {"Node Type": "Sort", "Plans": [
                {"Node Type": "Index Scan"},
                {"Node Type": "Index Scan"}
            ]}
        ]
    }"#;
    let graph = build(json);

    let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "root", "root-0", "root-0-0", "root-0-1", "root-1", "root-1-0", "root-1-1"
        ]
    );
    assert_eq!(by_id(&graph, "root-1-0").data.label, "Index Scan");

    // Pairwise distinct.
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn test_one_edge_per_child() {
    let json = r#"{
        "Node Type": "Nested Loop",
        "Plans": [
            {"Node Type": "Seq Scan"},
            {"Node Type": "Index Scan", "Plans": [{"Node Type": "Sort"}]}
        ]
    }"#;
    let graph = build(json);

    let edge_ids: Vec<&str> = graph.edges.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        edge_ids,
        vec!["root->root-0", "root->root-1", "root-1->root-1-0"]
    );
    for edge in &graph.edges {
        assert!(edge.target.starts_with(&edge.source));
    }
}

#[test]
fn test_build_is_deterministic() {
    let json = r#"{
        "Node Type": "Hash Join",
        "Total Cost": 100.0,
        "Actual Total Time": 50.0,
        "Plans": [
            {"Node Type": "Seq Scan", "Total Cost": 40.0, "Actual Total Time": 20.0},
            {"Node Type": "Hash", "Subplan Name": "SubPlan 1"}
        ]
    }"#;

    let first = build(json);
    let second = build(json);
    assert_eq!(first, second);
}

// ============================================================================
// Inclusive / exclusive aggregation
// ============================================================================

#[test]
fn test_two_node_plan_end_to_end() {
    let json = r#"{
        "Node Type": "Hash Join",
        "Total Cost": 100.0,
        "Actual Total Time": 50.0,
        "Plans": [
            {
                "Node Type": "Seq Scan",
                "Total Cost": 40.0,
                "Actual Total Time": 20.0,
                "Actual Loops": 1
            }
        ]
    }"#;
    let graph = build(json);

    let root = by_id(&graph, "root");
    let child = by_id(&graph, "root-0");

    assert_eq!(root.data.inclusive.time_ms, 50.0);
    assert_eq!(child.data.inclusive.time_ms, 20.0);
    assert_eq!(root.data.exclusive.time_ms, 30.0);
    assert_eq!(child.data.exclusive.time_ms, 20.0);
    assert_eq!(root.data.inclusive.cost, 100.0);
    assert_eq!(root.data.exclusive.cost, 60.0);

    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].source, "root");
    assert_eq!(graph.edges[0].target, "root-0");
    assert!(graph.subplan_roots.is_empty());
}

#[test]
fn test_leaf_exclusive_equals_inclusive() {
    let json = r#"{
        "Node Type": "Seq Scan",
        "Total Cost": 12.0,
        "Actual Total Time": 3.0,
        "Shared Hit Blocks": 9,
        "Temp Written Blocks": 2
    }"#;
    let graph = build(json);

    let leaf = &graph.nodes[0].data;
    assert_eq!(leaf.exclusive, leaf.inclusive);
}

#[test]
fn test_exclusive_clamped_when_children_exceed_parent() {
    // Parallel paths can legitimately report a child total above the
    // parent's; self figures must clamp at zero, never go negative.
    let json = r#"{
        "Node Type": "Gather Merge",
        "Actual Total Time": 50.0,
        "Plans": [
            {"Node Type": "Sort", "Actual Total Time": 80.0}
        ]
    }"#;
    let graph = build(json);

    assert_eq!(by_id(&graph, "root").data.exclusive.time_ms, 0.0);
    assert_eq!(by_id(&graph, "root-0").data.exclusive.time_ms, 80.0);
}

#[test]
fn test_buffer_counters_aggregate_like_time() {
    let json = r#"{
        "Node Type": "Aggregate",
        "Shared Hit Blocks": 10,
        "Shared Read Blocks": 6,
        "Plans": [
            {"Node Type": "Seq Scan", "Shared Hit Blocks": 4, "Shared Read Blocks": 6}
        ]
    }"#;
    let graph = build(json);

    let root = &by_id(&graph, "root").data;
    assert_eq!(root.inclusive.shared_hit, 10.0);
    assert_eq!(root.exclusive.shared_hit, 6.0);
    assert_eq!(root.exclusive.shared_read, 0.0);
}

#[test]
fn test_time_multiplies_loops() {
    let json = r#"{
        "Node Type": "Nested Loop",
        "Actual Total Time": 100.0,
        "Plans": [
            {"Node Type": "Index Scan", "Actual Total Time": 0.5, "Actual Loops": 100}
        ]
    }"#;
    let graph = build(json);

    assert_eq!(by_id(&graph, "root-0").data.inclusive.time_ms, 50.0);
    assert_eq!(by_id(&graph, "root").data.exclusive.time_ms, 50.0);
}

// ============================================================================
// Subplan / CTE context
// ============================================================================

#[test]
fn test_subplan_name_inherited_and_overridden() {
    let json = r#"{
        "Node Type": "Result",
        "Plans": [
            {
                "Node Type": "Limit",
                "Subplan Name": "InitPlan 1",
                "Plans": [
                    {"Node Type": "Seq Scan"},
                    {"Node Type": "Index Scan", "Subplan Name": "SubPlan 2"}
                ]
            }
        ]
    }"#;
    let graph = build(json);

    assert_eq!(by_id(&graph, "root").data.subplan_name, None);
    assert_eq!(
        by_id(&graph, "root-0").data.subplan_name.as_deref(),
        Some("InitPlan 1")
    );
    // Untagged grandchild inherits; tagged grandchild reports its own.
    assert_eq!(
        by_id(&graph, "root-0-0").data.subplan_name.as_deref(),
        Some("InitPlan 1")
    );
    assert_eq!(
        by_id(&graph, "root-0-1").data.subplan_name.as_deref(),
        Some("SubPlan 2")
    );

    assert_eq!(
        graph.subplan_roots,
        vec![
            SubplanRoot {
                name: "InitPlan 1".to_string(),
                id: "root-0".to_string()
            },
            SubplanRoot {
                name: "SubPlan 2".to_string(),
                id: "root-0-1".to_string()
            },
        ]
    );
}

// ============================================================================
// Row estimation
// ============================================================================

#[test]
fn test_estimation_factor_requires_positive_plan_rows() {
    let zero = build(r#"{"Node Type": "Result", "Plan Rows": 0, "Actual Rows": 10}"#);
    assert_eq!(zero.nodes[0].data.est_factor, None);
    assert_eq!(zero.nodes[0].data.est_direction, None);

    let absent = build(r#"{"Node Type": "Result", "Actual Rows": 10}"#);
    assert_eq!(absent.nodes[0].data.est_factor, None);
}

#[test]
fn test_estimation_direction() {
    let under = build(r#"{"Node Type": "Seq Scan", "Plan Rows": 100, "Actual Rows": 150}"#);
    assert_eq!(under.nodes[0].data.est_factor, Some(1.5));
    assert_eq!(under.nodes[0].data.est_direction, Some(EstDirection::Under));

    let over = build(r#"{"Node Type": "Seq Scan", "Plan Rows": 100, "Actual Rows": 50}"#);
    assert_eq!(over.nodes[0].data.est_factor, Some(0.5));
    assert_eq!(over.nodes[0].data.est_direction, Some(EstDirection::Over));

    let exact = build(r#"{"Node Type": "Seq Scan", "Plan Rows": 100, "Actual Rows": 100}"#);
    assert_eq!(exact.nodes[0].data.est_direction, Some(EstDirection::Exact));
}

#[test]
fn test_estimation_counts_all_loops() {
    let json = r#"{"Node Type": "Index Scan", "Plan Rows": 10, "Actual Rows": 5, "Actual Loops": 4}"#;
    let graph = build(json);

    assert_eq!(graph.nodes[0].data.est_actual_total_rows, 20.0);
    assert_eq!(graph.nodes[0].data.est_factor, Some(2.0));
}

// ============================================================================
// Parallel query (Gather) time attribution
// ============================================================================

#[test]
fn test_gather_divides_child_time_by_worker_count() {
    let json = r#"{
        "Node Type": "Gather",
        "Workers Planned": 2,
        "Actual Total Time": 40.0,
        "Plans": [
            {"Node Type": "Seq Scan", "Actual Total Time": 30.0, "Actual Loops": 3}
        ]
    }"#;
    let graph = build(json);

    // Child reports 30ms/loop * 3 loops summed over workers + leader.
    assert_eq!(by_id(&graph, "root-0").data.inclusive.time_ms, 30.0);
    // The Gather node itself is not under a Gather, so no division.
    assert_eq!(by_id(&graph, "root").data.inclusive.time_ms, 40.0);
}

#[test]
fn test_gather_skips_initplan_children() {
    let json = r#"{
        "Node Type": "Gather",
        "Workers Planned": 1,
        "Plans": [
            {
                "Node Type": "Result",
                "Parent Relationship": "InitPlan",
                "Actual Total Time": 10.0
            },
            {
                "Node Type": "Seq Scan",
                "Parent Relationship": "Outer",
                "Actual Total Time": 10.0
            }
        ]
    }"#;
    let graph = build(json);

    assert_eq!(by_id(&graph, "root-0").data.inclusive.time_ms, 10.0);
    assert_eq!(by_id(&graph, "root-1").data.inclusive.time_ms, 5.0);
}

// ============================================================================
// Limits and special flags
// ============================================================================

#[test]
fn test_node_count_limit() {
    let json = r#"{
        "Node Type": "Append",
        "Plans": [{"Node Type": "Seq Scan"}, {"Node Type": "Seq Scan"}]
    }"#;
    let opts = BuildOptions {
        max_nodes: 2,
        ..Default::default()
    };

    let err = build_graph(node(json), &opts).expect_err("should hit the limit");
    assert!(matches!(
        err,
        ExplainError::LimitExceeded {
            what: "node count",
            limit: 2
        }
    ));
}

#[test]
fn test_depth_limit() {
    let json = r#"{
        "Node Type": "Limit",
        "Plans": [{"Node Type": "Sort", "Plans": [{"Node Type": "Seq Scan"}]}]
    }"#;
    let opts = BuildOptions {
        max_depth: 2,
        ..Default::default()
    };

    let err = build_graph(node(json), &opts).expect_err("should hit the limit");
    assert!(matches!(
        err,
        ExplainError::LimitExceeded {
            what: "depth",
            limit: 2
        }
    ));
}

#[test]
fn test_never_executed_requires_analyze_run() {
    let json = r#"{
        "Node Type": "Result",
        "Plans": [{"Node Type": "Seq Scan", "Actual Loops": 0}]
    }"#;

    let analyzed = build_graph(
        node(json),
        &BuildOptions {
            execution_time: Some(12.0),
            ..Default::default()
        },
    )
    .expect("build failed");
    assert!(analyzed.nodes[1].data.never_executed);
    assert!(!analyzed.nodes[0].data.never_executed);

    let plain = build(json);
    assert!(!plain.nodes[1].data.never_executed);
}

#[test]
fn test_deep_plan_does_not_overflow_the_stack() {
    // A chain far deeper than any sane call stack budget; the explicit
    // work stack walks it without recursion.
    let mut plan = Arc::new(RawPlanNode {
        node_type: Some("Seq Scan".to_string()),
        ..Default::default()
    });
    for _ in 0..4_000 {
        plan = Arc::new(RawPlanNode {
            node_type: Some("Limit".to_string()),
            plans: vec![plan],
            ..Default::default()
        });
    }

    let opts = BuildOptions {
        max_depth: 10_000,
        ..Default::default()
    };
    let graph = build_graph(plan, &opts).expect("build failed");
    assert_eq!(graph.nodes.len(), 4_001);
    assert_eq!(graph.edges.len(), 4_000);
}
