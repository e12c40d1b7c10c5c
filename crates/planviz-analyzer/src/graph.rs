//! Tree-to-graph builder
//!
//! Walks the raw plan tree and produces the annotated node/edge graph the
//! renderer consumes: stable positional ids, per-node inclusive and
//! exclusive [`Metrics`], row-estimation accuracy, subplan/CTE context, and
//! the list of subplan roots.
//!
//! The traversal uses an explicit work stack over an arena of visited nodes
//! rather than recursion, so the supported plan depth is independent of the
//! call stack. Nodes are emitted pre-order (parents before children), which
//! lets a single reverse pass fold each node's inclusive metrics into its
//! parent's child accumulator for the exclusive computation.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ExplainError, Result};
use crate::hints::{self, CostHint, SlowHint};
use crate::metrics::Metrics;
use crate::raw::RawPlanNode;

/// Sentinel id of the root node; every other id is
/// `"{parent_id}-{child_index}"`, which is globally unique and reproducible
/// across runs on identical input.
pub const ROOT_ID: &str = "root";

pub const DEFAULT_MAX_NODES: usize = 100_000;
pub const DEFAULT_MAX_DEPTH: usize = 2_048;

/// Options for [`build_graph`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Total execution time when the plan came from EXPLAIN ANALYZE. Drives
    /// never-executed marking and the hint post-pass denominators.
    pub execution_time: Option<f64>,
    /// Bound on the number of plan nodes; exceeding it fails with
    /// [`ExplainError::LimitExceeded`] instead of running unbounded.
    pub max_nodes: usize,
    /// Bound on tree depth, same failure mode.
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            execution_time: None,
            max_nodes: DEFAULT_MAX_NODES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Whether the planner over- or under-estimated a node's row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EstDirection {
    Over,
    Under,
    Exact,
}

/// One node of the output graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub data: PlanNodeData,
}

/// Directed parent -> child edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// A node that carries its own (non-inherited) subplan/CTE tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubplanRoot {
    pub name: String,
    pub id: String,
}

/// The builder's output bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub subplan_roots: Vec<SubplanRoot>,
}

/// Fully annotated per-node payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanNodeData {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_relationship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_cond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recheck_cond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_cond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_cond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_filter: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_key: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort_key: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub presorted_key: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_space_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_space_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_aware: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_capable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers_planned: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers_launched: Option<u64>,

    // Planner estimates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_rows: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_width: Option<u64>,

    // ANALYZE figures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_startup_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_filter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_join_filter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_index_recheck: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap_fetches: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_read_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_write_time: Option<f64>,

    // Row-estimation accuracy. `est_factor` is None when the planner gave
    // no usable estimate, which is distinct from a zero estimate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_direction: Option<EstDirection>,
    pub est_actual_total_rows: f64,

    /// Subtree-total figures, as reported by the profiler.
    pub inclusive: Metrics,
    /// Self-only figures: `max(inclusive - sum(children inclusive), 0)`.
    pub exclusive: Metrics,

    /// Effective subplan/CTE context: the node's own tag if set, otherwise
    /// inherited from the nearest tagged ancestor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subplan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cte_name: Option<String>,

    pub never_executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_hint: Option<SlowHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_hint: Option<CostHint>,

    /// Back-reference to the raw record for detail display.
    pub raw: Arc<RawPlanNode>,
}

struct Frame {
    plan: Arc<RawPlanNode>,
    parent: Option<usize>,
    child_index: usize,
    depth: usize,
    inherited_subplan: Option<String>,
    gather_workers: Option<u64>,
}

struct Visit {
    plan: Arc<RawPlanNode>,
    id: String,
    parent: Option<usize>,
    subplan_name: Option<String>,
    worker_factor: f64,
}

/// Builds the annotated graph for one plan tree.
///
/// Deterministic: identical input yields identical node order, edge order,
/// ids, and derived figures.
pub fn build_graph(root: Arc<RawPlanNode>, opts: &BuildOptions) -> Result<PlanGraph> {
    let mut visits: Vec<Visit> = Vec::new();
    let mut edges: Vec<GraphEdge> = Vec::new();
    let mut subplan_roots: Vec<SubplanRoot> = Vec::new();

    let mut stack = vec![Frame {
        plan: root,
        parent: None,
        child_index: 0,
        depth: 0,
        inherited_subplan: None,
        gather_workers: None,
    }];

    while let Some(frame) = stack.pop() {
        if visits.len() >= opts.max_nodes {
            return Err(ExplainError::LimitExceeded {
                what: "node count",
                limit: opts.max_nodes,
            });
        }
        if frame.depth >= opts.max_depth {
            return Err(ExplainError::LimitExceeded {
                what: "depth",
                limit: opts.max_depth,
            });
        }

        let index = visits.len();
        let id = match frame.parent {
            None => ROOT_ID.to_string(),
            Some(parent) => format!("{}-{}", visits[parent].id, frame.child_index),
        };
        if let Some(parent) = frame.parent {
            let source = visits[parent].id.clone();
            edges.push(GraphEdge {
                id: format!("{source}->{id}"),
                source,
                target: id.clone(),
            });
        }

        // Own tag wins and marks a subplan root; otherwise the name flows
        // down unchanged from the nearest tagged ancestor.
        if let Some(name) = &frame.plan.subplan_name {
            subplan_roots.push(SubplanRoot {
                name: name.clone(),
                id: id.clone(),
            });
        }
        let subplan_name = frame
            .plan
            .subplan_name
            .clone()
            .or(frame.inherited_subplan);

        // Under Gather/Gather Merge, children report worker-summed times.
        // InitPlan/SubPlan children run outside the worker pool.
        let gather_for_children = frame.plan.gather_workers().or(frame.gather_workers);
        for (child_index, child) in frame.plan.plans.iter().enumerate().rev() {
            let child_gather = match child.parent_relationship.as_deref() {
                Some("InitPlan") | Some("SubPlan") => None,
                _ => gather_for_children,
            };
            stack.push(Frame {
                plan: Arc::clone(child),
                parent: Some(index),
                child_index,
                depth: frame.depth + 1,
                inherited_subplan: subplan_name.clone(),
                gather_workers: child_gather,
            });
        }

        visits.push(Visit {
            plan: frame.plan,
            id,
            parent: frame.parent,
            subplan_name,
            worker_factor: (frame.gather_workers.unwrap_or(0) + 1) as f64,
        });
    }

    // Exclusive = inclusive - sum(children inclusive), clamped. The arena is
    // pre-order, so iterating in reverse visits every child before its
    // parent's accumulator is read.
    let inclusive: Vec<Metrics> = visits
        .iter()
        .map(|visit| Metrics::inclusive_of(&visit.plan, visit.worker_factor))
        .collect();
    let mut child_sums = vec![Metrics::zero(); visits.len()];
    let mut exclusive = vec![Metrics::zero(); visits.len()];
    for i in (0..visits.len()).rev() {
        exclusive[i] = inclusive[i].saturating_sub(&child_sums[i]);
        if let Some(parent) = visits[i].parent {
            child_sums[parent] += inclusive[i];
        }
    }

    let mut nodes: Vec<GraphNode> = Vec::with_capacity(visits.len());
    for (i, visit) in visits.into_iter().enumerate() {
        let id = visit.id.clone();
        let data = plan_node_data(visit, inclusive[i], exclusive[i], opts);
        nodes.push(GraphNode { id, data });
    }

    hints::annotate(&mut nodes, opts.execution_time);

    tracing::debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        subplan_roots = subplan_roots.len(),
        "built plan graph"
    );

    Ok(PlanGraph {
        nodes,
        edges,
        subplan_roots,
    })
}

fn plan_node_data(
    visit: Visit,
    inclusive: Metrics,
    exclusive: Metrics,
    opts: &BuildOptions,
) -> PlanNodeData {
    let plan = &visit.plan;
    let loops = plan.loops();
    let est_actual_total_rows = plan.actual_rows.unwrap_or(0.0) * loops;

    let (est_factor, est_direction) = match plan.plan_rows {
        Some(plan_rows) if plan_rows > 0.0 => {
            let factor = est_actual_total_rows / plan_rows;
            let direction = if factor > 1.0 {
                EstDirection::Under
            } else if factor < 1.0 {
                EstDirection::Over
            } else {
                EstDirection::Exact
            };
            (Some(factor), Some(direction))
        }
        _ => (None, None),
    };

    let never_executed = opts.execution_time.is_some() && plan.actual_loops == Some(0.0);

    PlanNodeData {
        label: plan.label().to_string(),
        relation_name: plan.relation_name.clone(),
        schema: plan.schema.clone(),
        alias: plan.alias.clone(),
        join_type: plan.join_type.clone(),
        parent_relationship: plan.parent_relationship.clone(),
        scan_direction: plan.scan_direction.clone(),
        index_name: plan.index_name.clone(),
        index_cond: plan.index_cond.clone(),
        recheck_cond: plan.recheck_cond.clone(),
        filter: plan.filter.clone(),
        hash_cond: plan.hash_cond.clone(),
        merge_cond: plan.merge_cond.clone(),
        join_filter: plan.join_filter.clone(),
        group_key: plan.group_key.clone().unwrap_or_default(),
        sort_key: plan.sort_key.clone().unwrap_or_default(),
        presorted_key: plan.presorted_key.clone().unwrap_or_default(),
        output: plan.output.clone().unwrap_or_default(),
        sort_method: plan.sort_method.clone(),
        sort_space_used: plan.sort_space_used,
        sort_space_type: plan.sort_space_type.clone(),
        parallel_aware: plan.parallel_aware,
        async_capable: plan.async_capable,
        workers_planned: plan.workers_planned,
        workers_launched: plan.workers_launched,
        startup_cost: plan.startup_cost,
        total_cost: plan.total_cost,
        plan_rows: plan.plan_rows,
        plan_width: plan.plan_width,
        actual_startup_time: plan.actual_startup_time,
        actual_total_time: plan.actual_total_time,
        actual_rows: plan.actual_rows,
        actual_loops: plan.actual_loops,
        rows_removed_by_filter: plan.rows_removed_by_filter,
        rows_removed_by_join_filter: plan.rows_removed_by_join_filter,
        rows_removed_by_index_recheck: plan.rows_removed_by_index_recheck,
        heap_fetches: plan.heap_fetches,
        io_read_time: plan.io_read_time,
        io_write_time: plan.io_write_time,
        est_factor,
        est_direction,
        est_actual_total_rows,
        inclusive,
        exclusive,
        cte_name: plan.cte_name.clone(),
        never_executed,
        slow_hint: None,
        cost_hint: None,
        raw: Arc::clone(plan),
        subplan_name: visit.subplan_name,
    }
}

#[cfg(test)]
mod tests;
