//! Public entry point
//!
//! [`analyze`] ties ingestion, metadata extraction, and the graph builder
//! together into one pure, synchronous call. Bad input never surfaces as an
//! error here: users paste arbitrary text, so ingestion failures come back
//! as an empty graph with a [`Diagnostic`] for the presentation layer to
//! show. Re-running on identical input produces an identical bundle.

use serde::Serialize;

use crate::error::{Diagnostic, ExplainError};
use crate::graph::{self, BuildOptions, GraphEdge, GraphNode, SubplanRoot};
use crate::meta::PlanMeta;
use crate::raw;

/// The complete analysis bundle: the graph for the layout/render
/// collaborator plus side metadata for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub subplan_roots: Vec<SubplanRoot>,
    #[serde(flatten)]
    pub meta: PlanMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl Analysis {
    fn failed(meta: PlanMeta, err: &ExplainError) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            subplan_roots: Vec::new(),
            meta,
            diagnostic: Some(Diagnostic::from(err)),
        }
    }
}

/// Analyzes EXPLAIN (FORMAT JSON) output with default limits.
pub fn analyze(input: &str) -> Analysis {
    analyze_with(input, &BuildOptions::default())
}

/// Analyzes with caller-provided limits. `options.execution_time` is
/// overwritten from the parsed metadata; only the limits are taken from the
/// caller.
pub fn analyze_with(input: &str, options: &BuildOptions) -> Analysis {
    let entry = match raw::parse_explain(input) {
        Ok(entry) => entry,
        Err(err) => {
            tracing::debug!(error = %err, "explain ingestion failed");
            return Analysis::failed(PlanMeta::default(), &err);
        }
    };

    // Metadata lives next to the plan, not inside it, so it survives a
    // missing plan root.
    let meta = PlanMeta::from_entry(&entry);

    let plan = match entry.require_plan() {
        Ok(plan) => plan.clone(),
        Err(err) => return Analysis::failed(meta, &err),
    };

    let options = BuildOptions {
        execution_time: meta.execution_time,
        ..options.clone()
    };
    match graph::build_graph(plan, &options) {
        Ok(graph) => Analysis {
            nodes: graph.nodes,
            edges: graph.edges,
            subplan_roots: graph.subplan_roots,
            meta,
            diagnostic: None,
        },
        Err(err) => {
            tracing::warn!(error = %err, "plan graph build failed");
            Analysis::failed(meta, &err)
        }
    }
}
