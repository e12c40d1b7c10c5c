//! Per-subtree metric accumulator
//!
//! [`Metrics`] holds the quantities tracked per plan node: total time, total
//! cost, and the ten buffer counters. The same shape is used for a node's
//! inclusive figures (as reported by PostgreSQL, which already accounts for
//! the whole subtree) and for its exclusive figures (self-only, derived by
//! clamped subtraction in the graph builder).

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::raw::RawPlanNode;

/// Additive metric bundle. Every field is non-negative; [`Metrics::zero`] is
/// the identity of the field-wise merge, so children can be accumulated in
/// any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub time_ms: f64,
    pub cost: f64,
    pub shared_hit: f64,
    pub shared_read: f64,
    pub shared_dirtied: f64,
    pub shared_written: f64,
    pub local_hit: f64,
    pub local_read: f64,
    pub local_dirtied: f64,
    pub local_written: f64,
    pub temp_read: f64,
    pub temp_written: f64,
}

impl Metrics {
    /// The all-zero accumulator.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A node's inclusive figures, read straight off its reported fields
    /// with every missing value defaulted to zero.
    ///
    /// Reported times are per loop; the total multiplies by the loop count.
    /// Under a Gather node the children's times are summed across workers,
    /// so `worker_factor` (workers + 1) divides the total back to wall-clock
    /// scale.
    pub fn inclusive_of(plan: &RawPlanNode, worker_factor: f64) -> Self {
        Self {
            time_ms: plan.actual_total_time.unwrap_or(0.0) * plan.loops() / worker_factor,
            cost: plan.total_cost.unwrap_or(0.0),
            shared_hit: plan.shared_hit_blocks.unwrap_or(0.0),
            shared_read: plan.shared_read_blocks.unwrap_or(0.0),
            shared_dirtied: plan.shared_dirtied_blocks.unwrap_or(0.0),
            shared_written: plan.shared_written_blocks.unwrap_or(0.0),
            local_hit: plan.local_hit_blocks.unwrap_or(0.0),
            local_read: plan.local_read_blocks.unwrap_or(0.0),
            local_dirtied: plan.local_dirtied_blocks.unwrap_or(0.0),
            local_written: plan.local_written_blocks.unwrap_or(0.0),
            temp_read: plan.temp_read_blocks.unwrap_or(0.0),
            temp_written: plan.temp_written_blocks.unwrap_or(0.0),
        }
    }

    /// Field-wise `max(self - other, 0)`.
    ///
    /// The clamp is mandatory: reported inclusive figures are not guaranteed
    /// to be monotonically >= the sum of children (measurement noise,
    /// parallel execution paths), and a negative self value is never
    /// meaningful.
    pub fn saturating_sub(&self, other: &Self) -> Self {
        Self {
            time_ms: (self.time_ms - other.time_ms).max(0.0),
            cost: (self.cost - other.cost).max(0.0),
            shared_hit: (self.shared_hit - other.shared_hit).max(0.0),
            shared_read: (self.shared_read - other.shared_read).max(0.0),
            shared_dirtied: (self.shared_dirtied - other.shared_dirtied).max(0.0),
            shared_written: (self.shared_written - other.shared_written).max(0.0),
            local_hit: (self.local_hit - other.local_hit).max(0.0),
            local_read: (self.local_read - other.local_read).max(0.0),
            local_dirtied: (self.local_dirtied - other.local_dirtied).max(0.0),
            local_written: (self.local_written - other.local_written).max(0.0),
            temp_read: (self.temp_read - other.temp_read).max(0.0),
            temp_written: (self.temp_written - other.temp_written).max(0.0),
        }
    }
}

impl Add for Metrics {
    type Output = Metrics;

    fn add(self, rhs: Metrics) -> Metrics {
        Metrics {
            time_ms: self.time_ms + rhs.time_ms,
            cost: self.cost + rhs.cost,
            shared_hit: self.shared_hit + rhs.shared_hit,
            shared_read: self.shared_read + rhs.shared_read,
            shared_dirtied: self.shared_dirtied + rhs.shared_dirtied,
            shared_written: self.shared_written + rhs.shared_written,
            local_hit: self.local_hit + rhs.local_hit,
            local_read: self.local_read + rhs.local_read,
            local_dirtied: self.local_dirtied + rhs.local_dirtied,
            local_written: self.local_written + rhs.local_written,
            temp_read: self.temp_read + rhs.temp_read,
            temp_written: self.temp_written + rhs.temp_written,
        }
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, rhs: Metrics) {
        *self = *self + rhs;
    }
}
