//! Critical-feature guard.
//!
//! A handful of inputs (system load, unit price) dominate the model output.
//! A zero or missing value there produces garbage, so they are repaired from
//! strictly positive history before the model ever sees them.

use chrono::Timelike;

use super::fallback::{fallback_value, history_mean, trailing_mean, Positivity};
use super::plan::FeaturePlan;
use crate::domain::{Granularity, Period};
use crate::history::{HistoryRow, WorkingHistory};

/// Same-hour samples averaged by the hourly pre-fill repair
const SAME_HOUR_SAMPLES: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPass {
    /// Before the generic fill step
    BeforeFill,
    /// Last pass, after the generic fill step
    Final,
}

/// Missing, non-finite, or zero
pub fn needs_repair(value: f64) -> bool {
    !value.is_finite() || value == 0.0
}

fn same_hour_mean(rows: &[HistoryRow], column: usize, hour: u32) -> Option<f64> {
    let (sum, count) = rows
        .iter()
        .rev()
        .filter(|r| r.timestamp.hour() == hour)
        .map(|r| r.value(column))
        .filter(|v| v.is_finite())
        .take(SAME_HOUR_SAMPLES)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn repair(rows: &[HistoryRow], column: usize, target: &Period, pass: GuardPass) -> Option<f64> {
    let g = target.granularity;
    let candidates: Vec<Option<f64>> = match pass {
        GuardPass::BeforeFill if g == Granularity::Hour => vec![
            same_hour_mean(rows, column, target.hour()),
            fallback_value(rows, column, g.fallback_window(), true),
        ],
        GuardPass::BeforeFill => vec![fallback_value(rows, column, g.fallback_window(), true)],
        GuardPass::Final => vec![
            trailing_mean(rows, column, g.guard_window(), Positivity::StrictlyPositive),
            history_mean(rows, column, Positivity::StrictlyPositive),
            history_mean(rows, column, Positivity::Any),
        ],
    };
    candidates
        .into_iter()
        .flatten()
        .find(|v| !needs_repair(*v))
}

/// Repair critical slots of `values` (ordered as `plan`) in place.
/// Returns the number of slots that were repaired.
pub fn guard_critical(
    values: &mut [f64],
    plan: &FeaturePlan,
    history: &WorkingHistory,
    target: &Period,
    pass: GuardPass,
) -> usize {
    let mut repaired = 0;
    for (slot, value) in plan.slots().iter().zip(values.iter_mut()) {
        if !slot.critical || !needs_repair(*value) {
            continue;
        }
        let Some(column) = slot.column else {
            continue;
        };
        if let Some(fixed) = repair(history.rows(), column, target, pass) {
            *value = fixed;
            repaired += 1;
        }
    }
    repaired
}
