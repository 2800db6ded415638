//! Lag resolution over the working history.
//!
//! `<base>_lag_N` for a target period reads `<base>` from the newest row at or
//! before `target - N periods`. Hourly lags count hours, daily and weekly lags
//! count days, monthly lags count months. Monthly history is sparse, so every
//! monthly lag collapses onto the 1-month lookup.

use chrono::NaiveDateTime;

use super::fallback::{trailing_mean, Positivity};
use super::plan::LagFeature;
use crate::domain::{Granularity, Period};
use crate::history::WorkingHistory;

/// Where a resolved lag value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagSource {
    /// Read from the row at this timestamp
    Lookup(NaiveDateTime),
    /// Trailing mean of the lag column itself
    TrailingLag,
    /// Trailing mean of the base column
    TrailingBase,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagResolution {
    pub value: f64,
    pub source: LagSource,
}

/// Offset actually looked up for a lag of `offset` periods
pub fn effective_offset(granularity: Granularity, offset: u32) -> u32 {
    match granularity {
        Granularity::Month => 1,
        _ => offset,
    }
}

/// Timestamp a lag lookup targets
pub fn lookup_time(target: &Period, offset: u32) -> Option<NaiveDateTime> {
    let n = i64::from(effective_offset(target.granularity, offset));
    let unit = match target.granularity {
        // weekly lags are day-denominated
        Granularity::Week => Granularity::Day,
        other => other,
    };
    unit.shift(target.start, -n)
}

/// Resolve a lag feature. Preference: looked-up value, then the trailing mean
/// of the lag column, then the trailing mean of the base column.
/// `None` only when no column holds a single finite value.
pub fn resolve_lag(
    history: &WorkingHistory,
    target: &Period,
    lag: &LagFeature,
    lag_column: Option<usize>,
    base_column: Option<usize>,
) -> Option<LagResolution> {
    let looked_up = lookup_time(target, lag.offset)
        .and_then(|at| history.latest_at_or_before(at))
        .and_then(|row| {
            let value = base_column.or(lag_column).map(|c| row.value(c))?;
            value.is_finite().then_some(LagResolution {
                value,
                source: LagSource::Lookup(row.timestamp),
            })
        });
    if looked_up.is_some() {
        return looked_up;
    }

    let window = target.granularity.fallback_window();
    let trailing = |column: Option<usize>, source: LagSource| {
        column
            .and_then(|c| trailing_mean(history.rows(), c, window, Positivity::Any))
            .map(|value| LagResolution { value, source })
    };
    trailing(lag_column, LagSource::TrailingLag)
        .or_else(|| trailing(base_column, LagSource::TrailingBase))
}
