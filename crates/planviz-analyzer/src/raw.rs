//! Raw EXPLAIN (FORMAT JSON) input model
//!
//! Typed view over PostgreSQL's machine-readable EXPLAIN output. Every field
//! the analysis reads is modeled explicitly with its PostgreSQL name; keys we
//! do not model are kept verbatim in `extra` so the original record can be
//! reproduced for detail display.
//!
//! All numeric fields stay `Option` here. Defaulting (missing -> 0, absent
//! loops -> 1) happens in one place, when a node's [`Metrics`] are derived,
//! so the graph traversal never has to re-apply a default.
//!
//! [`Metrics`]: crate::metrics::Metrics

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExplainError, Result};

/// One element of the top-level EXPLAIN output array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawExplainEntry {
    #[serde(rename = "Plan", skip_serializing_if = "Option::is_none")]
    pub plan: Option<Arc<RawPlanNode>>,
    #[serde(rename = "Planning Time", skip_serializing_if = "Option::is_none")]
    pub planning_time: Option<f64>,
    #[serde(rename = "Execution Time", skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(rename = "JIT", skip_serializing_if = "Option::is_none")]
    pub jit: Option<RawJit>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawExplainEntry {
    /// Returns the root plan node, or `MissingPlan` when the record carries
    /// none (the schema-failure case: valid JSON, no usable `"Plan"`).
    pub fn require_plan(&self) -> Result<&Arc<RawPlanNode>> {
        self.plan.as_ref().ok_or(ExplainError::MissingPlan)
    }
}

/// The `JIT` sub-record. Total JIT time has moved between releases, so both
/// known locations are modeled; `Timing.Total` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawJit {
    #[serde(rename = "Timing", skip_serializing_if = "Option::is_none")]
    pub timing: Option<RawJitTiming>,
    #[serde(rename = "Total Time", skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawJit {
    pub fn total(&self) -> Option<f64> {
        self.timing
            .as_ref()
            .and_then(|t| t.total)
            .or(self.total_time)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawJitTiming {
    #[serde(rename = "Total", skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One operator of the plan tree, as reported by PostgreSQL.
///
/// Children are `Arc`-wrapped so graph nodes can keep a cheap back-reference
/// to their raw record without cloning subtrees.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawPlanNode {
    #[serde(rename = "Node Type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(rename = "Parent Relationship", skip_serializing_if = "Option::is_none")]
    pub parent_relationship: Option<String>,
    #[serde(rename = "Subplan Name", skip_serializing_if = "Option::is_none")]
    pub subplan_name: Option<String>,
    #[serde(rename = "CTE Name", skip_serializing_if = "Option::is_none")]
    pub cte_name: Option<String>,
    #[serde(rename = "Relation Name", skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    #[serde(rename = "Schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(rename = "Alias", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "Index Name", skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(rename = "Index Cond", skip_serializing_if = "Option::is_none")]
    pub index_cond: Option<String>,
    #[serde(rename = "Recheck Cond", skip_serializing_if = "Option::is_none")]
    pub recheck_cond: Option<String>,
    #[serde(rename = "Filter", skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(rename = "Hash Cond", skip_serializing_if = "Option::is_none")]
    pub hash_cond: Option<String>,
    #[serde(rename = "Merge Cond", skip_serializing_if = "Option::is_none")]
    pub merge_cond: Option<String>,
    #[serde(rename = "Join Filter", skip_serializing_if = "Option::is_none")]
    pub join_filter: Option<String>,
    #[serde(rename = "Join Type", skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(rename = "Scan Direction", skip_serializing_if = "Option::is_none")]
    pub scan_direction: Option<String>,

    // Estimates
    #[serde(rename = "Startup Cost", skip_serializing_if = "Option::is_none")]
    pub startup_cost: Option<f64>,
    #[serde(rename = "Total Cost", skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(rename = "Plan Rows", skip_serializing_if = "Option::is_none")]
    pub plan_rows: Option<f64>,
    #[serde(rename = "Plan Width", skip_serializing_if = "Option::is_none")]
    pub plan_width: Option<u64>,

    // ANALYZE
    #[serde(rename = "Actual Startup Time", skip_serializing_if = "Option::is_none")]
    pub actual_startup_time: Option<f64>,
    #[serde(rename = "Actual Total Time", skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    #[serde(rename = "Actual Rows", skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(rename = "Actual Loops", skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<f64>,
    #[serde(rename = "Rows Removed by Filter", skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_filter: Option<u64>,
    #[serde(
        rename = "Rows Removed by Join Filter",
        skip_serializing_if = "Option::is_none"
    )]
    pub rows_removed_by_join_filter: Option<u64>,
    #[serde(
        rename = "Rows Removed by Index Recheck",
        skip_serializing_if = "Option::is_none"
    )]
    pub rows_removed_by_index_recheck: Option<u64>,
    #[serde(rename = "Heap Fetches", skip_serializing_if = "Option::is_none")]
    pub heap_fetches: Option<u64>,

    // Parallelism
    #[serde(rename = "Parallel Aware", skip_serializing_if = "Option::is_none")]
    pub parallel_aware: Option<bool>,
    #[serde(rename = "Async Capable", skip_serializing_if = "Option::is_none")]
    pub async_capable: Option<bool>,
    #[serde(rename = "Workers Planned", skip_serializing_if = "Option::is_none")]
    pub workers_planned: Option<u64>,
    #[serde(rename = "Workers Launched", skip_serializing_if = "Option::is_none")]
    pub workers_launched: Option<u64>,

    // Keys and columns
    #[serde(
        rename = "Group Key",
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_key: Option<Vec<String>>,
    #[serde(
        rename = "Sort Key",
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub sort_key: Option<Vec<String>>,
    #[serde(
        rename = "Presorted Key",
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub presorted_key: Option<Vec<String>>,
    #[serde(
        rename = "Output",
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub output: Option<Vec<String>>,

    // Sort detail
    #[serde(rename = "Sort Method", skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<String>,
    #[serde(rename = "Sort Space Used", skip_serializing_if = "Option::is_none")]
    pub sort_space_used: Option<u64>,
    #[serde(rename = "Sort Space Type", skip_serializing_if = "Option::is_none")]
    pub sort_space_type: Option<String>,

    // BUFFERS counters (per-node, inclusive of the subtree)
    #[serde(rename = "Shared Hit Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_hit_blocks: Option<f64>,
    #[serde(rename = "Shared Read Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_read_blocks: Option<f64>,
    #[serde(rename = "Shared Dirtied Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_dirtied_blocks: Option<f64>,
    #[serde(rename = "Shared Written Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_written_blocks: Option<f64>,
    #[serde(rename = "Local Hit Blocks", skip_serializing_if = "Option::is_none")]
    pub local_hit_blocks: Option<f64>,
    #[serde(rename = "Local Read Blocks", skip_serializing_if = "Option::is_none")]
    pub local_read_blocks: Option<f64>,
    #[serde(rename = "Local Dirtied Blocks", skip_serializing_if = "Option::is_none")]
    pub local_dirtied_blocks: Option<f64>,
    #[serde(rename = "Local Written Blocks", skip_serializing_if = "Option::is_none")]
    pub local_written_blocks: Option<f64>,
    #[serde(rename = "Temp Read Blocks", skip_serializing_if = "Option::is_none")]
    pub temp_read_blocks: Option<f64>,
    #[serde(rename = "Temp Written Blocks", skip_serializing_if = "Option::is_none")]
    pub temp_written_blocks: Option<f64>,
    #[serde(rename = "I/O Read Time", skip_serializing_if = "Option::is_none")]
    pub io_read_time: Option<f64>,
    #[serde(rename = "I/O Write Time", skip_serializing_if = "Option::is_none")]
    pub io_write_time: Option<f64>,

    // Children
    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<Arc<RawPlanNode>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawPlanNode {
    /// Operator label for display.
    pub fn label(&self) -> &str {
        self.node_type.as_deref().unwrap_or("Node")
    }

    /// Loop count used for per-loop to total conversions. Absent or zero
    /// loops count as one.
    pub fn loops(&self) -> f64 {
        match self.actual_loops {
            Some(loops) if loops > 0.0 => loops,
            _ => 1.0,
        }
    }

    /// Worker count for a Gather/Gather Merge node, preferring the planned
    /// count over the launched one.
    pub fn gather_workers(&self) -> Option<u64> {
        if !matches!(self.node_type.as_deref(), Some("Gather" | "Gather Merge")) {
            return None;
        }
        match (self.workers_planned, self.workers_launched) {
            (Some(planned), _) if planned > 0 => Some(planned),
            (_, Some(launched)) if launched > 0 => Some(launched),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExplainDoc {
    Many(Vec<RawExplainEntry>),
    One(RawExplainEntry),
}

/// Parses EXPLAIN (FORMAT JSON) output into its first result entry.
///
/// PostgreSQL wraps the output in a single-element array; a bare object with
/// a `"Plan"` field is accepted too. When the input is an array, only the
/// first entry is used.
pub fn parse_explain(input: &str) -> Result<RawExplainEntry> {
    let doc: ExplainDoc = serde_json::from_str(input.trim())?;
    match doc {
        ExplainDoc::Many(mut entries) => {
            if entries.is_empty() {
                return Err(ExplainError::MissingPlan);
            }
            Ok(entries.swap_remove(0))
        }
        ExplainDoc::One(entry) => Ok(entry),
    }
}

/// Same as [`parse_explain`] for already-parsed JSON.
pub fn parse_explain_value(value: Value) -> Result<RawExplainEntry> {
    let doc: ExplainDoc = serde_json::from_value(value)?;
    match doc {
        ExplainDoc::Many(mut entries) => {
            if entries.is_empty() {
                return Err(ExplainError::MissingPlan);
            }
            Ok(entries.swap_remove(0))
        }
        ExplainDoc::One(entry) => Ok(entry),
    }
}

/// Accepts either a single string or an array of strings; PostgreSQL emits
/// both shapes for key lists.
fn string_or_seq<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(items) => items,
    }))
}
