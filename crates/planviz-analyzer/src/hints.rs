//! Performance hint post-pass
//!
//! Scans the finished node list and tags operators that dominate the query:
//! either by share of the total self time / self cost, or as p90/p95
//! outliers among their peers. Hints are presentation aids only; they never
//! change the metrics themselves.

use serde::Serialize;

use crate::graph::GraphNode;

/// Nodes below this self time never get a slow hint.
const MIN_SELF_TIME_MS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlowHint {
    pub severity: Severity,
    pub self_time_ms: f64,
    pub self_time_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostHint {
    pub severity: Severity,
    pub self_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_cost_share: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_total_cost_share: Option<f64>,
}

/// Interpolated percentile of an unsorted sample. `p` is in `0.0..=1.0`;
/// an empty sample yields 0.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let weight = rank - lo as f64;
        sorted[lo] * (1.0 - weight) + sorted[hi] * weight
    }
}

fn raise(current: &mut Option<Severity>, new: Severity) {
    match current {
        Some(existing) if *existing >= new => {}
        _ => *current = Some(new),
    }
}

/// Attaches slow/cost hints to the node list.
///
/// When the run was EXPLAIN ANALYZE, `execution_time` anchors the self-time
/// share; otherwise the sum of all exclusive times is used.
pub(crate) fn annotate(nodes: &mut [GraphNode], execution_time: Option<f64>) {
    let fallback_total_time: f64 = nodes.iter().map(|n| n.data.exclusive.time_ms).sum();
    let total_self_time = execution_time
        .filter(|t| *t > 0.0)
        .unwrap_or(fallback_total_time);

    let self_times: Vec<f64> = nodes
        .iter()
        .map(|n| n.data.exclusive.time_ms)
        .filter(|v| *v > 0.0)
        .collect();
    let p90_time = percentile(&self_times, 0.9);
    let p95_time = percentile(&self_times, 0.95);

    let self_costs: Vec<f64> = nodes
        .iter()
        .map(|n| n.data.exclusive.cost)
        .filter(|v| *v > 0.0)
        .collect();
    let total_self_cost: f64 = self_costs.iter().sum();
    let p90_cost = percentile(&self_costs, 0.9);
    let p95_cost = percentile(&self_costs, 0.95);
    let max_total_cost = nodes
        .iter()
        .map(|n| n.data.total_cost.unwrap_or(0.0))
        .fold(0.0, f64::max);

    for node in nodes.iter_mut() {
        let data = &mut node.data;

        let self_time = data.exclusive.time_ms;
        if self_time >= MIN_SELF_TIME_MS && total_self_time > 0.0 {
            let share = self_time / total_self_time;
            let severity = if share >= 0.75 {
                Some(Severity::Alert)
            } else if share >= 0.35 {
                Some(Severity::Warn)
            } else if p95_time >= MIN_SELF_TIME_MS && self_time >= p95_time {
                Some(Severity::Alert)
            } else if p90_time >= MIN_SELF_TIME_MS && self_time >= p90_time {
                Some(Severity::Warn)
            } else {
                None
            };
            if let Some(severity) = severity {
                data.slow_hint = Some(SlowHint {
                    severity,
                    self_time_ms: self_time,
                    self_time_share: share,
                });
            }
        }

        let self_cost = data.exclusive.cost;
        let mut severity: Option<Severity> = None;
        let mut self_cost_share = None;
        let mut max_total_cost_share = None;

        if self_cost > 0.0 {
            if total_self_cost > 0.0 {
                let share = self_cost / total_self_cost;
                self_cost_share = Some(share);
                if share >= 0.5 {
                    raise(&mut severity, Severity::Alert);
                } else if share >= 0.25 {
                    raise(&mut severity, Severity::Warn);
                }
            }

            if max_total_cost > 0.0 {
                let share = self_cost / max_total_cost;
                max_total_cost_share = Some(share);
                if share >= 0.9 {
                    raise(&mut severity, Severity::Alert);
                } else if share >= 0.1 {
                    raise(&mut severity, Severity::Warn);
                }
            }

            if severity.is_none() {
                if p95_cost > 0.0 && self_cost >= p95_cost {
                    raise(&mut severity, Severity::Alert);
                } else if p90_cost > 0.0 && self_cost >= p90_cost {
                    raise(&mut severity, Severity::Warn);
                }
            }
        }

        if let Some(severity) = severity {
            data.cost_hint = Some(CostHint {
                severity,
                self_cost,
                self_cost_share,
                max_total_cost_share,
            });
        }
    }
}
