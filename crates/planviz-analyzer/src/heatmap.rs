//! Heatmap normalization
//!
//! A presentation layer colors each node by how large one selected metric is
//! relative to the global maximum. This module computes those maxima and the
//! 0-100 relative intensity; which metric is selected is a closed enum so a
//! new mode cannot be added without handling it everywhere.

use serde::{Deserialize, Serialize};

use crate::graph::{GraphNode, PlanNodeData};

/// The caller-selected heatmap metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatmapMode {
    #[default]
    None,
    Time,
    Rows,
    Cost,
}

impl HeatmapMode {
    /// The node's heat value under this mode, or `None` when heatmapping is
    /// disabled.
    pub fn heat_value(self, data: &PlanNodeData) -> Option<f64> {
        match self {
            HeatmapMode::None => None,
            HeatmapMode::Time => Some(time_heat(data)),
            HeatmapMode::Rows => Some(rows_heat(data)),
            HeatmapMode::Cost => Some(data.exclusive.cost),
        }
    }

    /// The matching global maximum.
    pub fn maximum(self, maxima: &HeatmapMaxima) -> Option<f64> {
        match self {
            HeatmapMode::None => None,
            HeatmapMode::Time => Some(maxima.max_time),
            HeatmapMode::Rows => Some(maxima.max_rows),
            HeatmapMode::Cost => Some(maxima.max_cost),
        }
    }

    /// Relative intensity of one node as a 0-100 percentage.
    pub fn intensity(self, data: &PlanNodeData, maxima: &HeatmapMaxima) -> Option<u8> {
        let value = self.heat_value(data)?;
        let max = self.maximum(maxima)?;
        Some(((value / max).clamp(0.0, 1.0) * 100.0).round() as u8)
    }
}

// Self time, but a node without a resolved exclusive time still gets heat
// from its reported total.
fn time_heat(data: &PlanNodeData) -> f64 {
    if data.exclusive.time_ms > 0.0 {
        data.exclusive.time_ms
    } else {
        data.actual_total_time.unwrap_or(0.0) * data.actual_loops.unwrap_or(1.0)
    }
}

// Rows actually produced across all loops, falling back to the planner's
// estimate for plain EXPLAIN output.
fn rows_heat(data: &PlanNodeData) -> f64 {
    let actual = data.actual_rows.unwrap_or(0.0) * data.actual_loops.unwrap_or(1.0);
    if actual > 0.0 {
        actual
    } else {
        data.plan_rows.unwrap_or(0.0)
    }
}

/// Per-metric maxima across all nodes of one graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatmapMaxima {
    pub max_time: f64,
    pub max_rows: f64,
    pub max_cost: f64,
}

impl HeatmapMaxima {
    /// Computes the maxima for one node list. A metric that is zero
    /// everywhere yields 1, never 0, so later division stays safe.
    pub fn compute(nodes: &[GraphNode]) -> Self {
        let mut max_time: f64 = 0.0;
        let mut max_rows: f64 = 0.0;
        let mut max_cost: f64 = 0.0;
        for node in nodes {
            max_time = max_time.max(time_heat(&node.data));
            max_rows = max_rows.max(rows_heat(&node.data));
            max_cost = max_cost.max(node.data.exclusive.cost);
        }
        Self {
            max_time: nonzero_or_one(max_time),
            max_rows: nonzero_or_one(max_rows),
            max_cost: nonzero_or_one(max_cost),
        }
    }
}

fn nonzero_or_one(value: f64) -> f64 {
    if value == 0.0 { 1.0 } else { value }
}

#[cfg(test)]
mod tests;
