//! Top-level plan metadata
//!
//! Scalars read off the root EXPLAIN record, independent of the per-node
//! walk. Absent fields stay absent (not zeroed) so a presentation layer can
//! distinguish "not reported" from "reported as zero".

use serde::Serialize;

use crate::raw::RawExplainEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlanMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jit_total_time: Option<f64>,
}

impl PlanMeta {
    pub fn from_entry(entry: &RawExplainEntry) -> Self {
        Self {
            planning_time: entry.planning_time,
            execution_time: entry.execution_time,
            jit_total_time: entry.jit.as_ref().and_then(|jit| jit.total()),
        }
    }
}
