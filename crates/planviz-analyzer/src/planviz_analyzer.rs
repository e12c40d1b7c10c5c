//! Planviz Analyzer - EXPLAIN plan graph analysis
//!
//! This crate turns PostgreSQL `EXPLAIN (FORMAT JSON)` output (optionally
//! from `EXPLAIN ANALYZE` with `BUFFERS`) into an annotated directed graph
//! suitable for visualization:
//!
//! - one [`GraphNode`] per plan operator with inclusive (subtree-total) and
//!   exclusive (self-only) time, cost, and buffer metrics
//! - one [`GraphEdge`] per parent/child relationship
//! - subplan/CTE context propagated to descendants, with the list of
//!   subplan roots collected along the way
//! - per-metric global maxima for heatmap rendering
//! - top-level planning/execution/JIT timing metadata
//!
//! # Example
//!
//! ```
//! use planviz_analyzer::{analyze, HeatmapMaxima};
//!
//! let json = r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users", "Total Cost": 10.5}}]"#;
//! let analysis = analyze(json);
//! assert!(analysis.diagnostic.is_none());
//! assert_eq!(analysis.nodes[0].id, "root");
//! assert_eq!(analysis.nodes[0].data.label, "Seq Scan");
//!
//! let maxima = HeatmapMaxima::compute(&analysis.nodes);
//! assert_eq!(maxima.max_cost, 10.5);
//! ```
//!
//! Malformed input is an expected condition: [`analyze`] never fails, it
//! returns an empty graph carrying a [`Diagnostic`] instead.

pub mod analysis;
pub mod error;
pub mod graph;
pub mod heatmap;
pub mod hints;
pub mod meta;
pub mod metrics;
pub mod raw;

pub use analysis::{Analysis, analyze, analyze_with};
pub use error::{Diagnostic, ExplainError, Result};
pub use graph::{
    BuildOptions, EstDirection, GraphEdge, GraphNode, PlanGraph, PlanNodeData, SubplanRoot,
    build_graph,
};
pub use heatmap::{HeatmapMaxima, HeatmapMode};
pub use hints::{CostHint, Severity, SlowHint};
pub use meta::PlanMeta;
pub use metrics::Metrics;
pub use raw::{RawExplainEntry, RawJit, RawPlanNode, parse_explain};
