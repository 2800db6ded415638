//! Trailing-mean fallbacks.
//!
//! Pure functions over a history slice: no caches, no hidden state.

use crate::history::HistoryRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Positivity {
    Any,
    StrictlyPositive,
}

impl Positivity {
    fn admits(self, value: f64) -> bool {
        value.is_finite()
            && match self {
                Self::Any => true,
                Self::StrictlyPositive => value > 0.0,
            }
    }
}

/// Mean of the last `window` admissible values of `column`, scanning back
/// from the newest row. Uses everything available when fewer exist.
pub fn trailing_mean(
    rows: &[HistoryRow],
    column: usize,
    window: usize,
    positivity: Positivity,
) -> Option<f64> {
    let (sum, count) = rows
        .iter()
        .rev()
        .map(|r| r.value(column))
        .filter(|v| positivity.admits(*v))
        .take(window)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Mean over the whole history
pub fn history_mean(rows: &[HistoryRow], column: usize, positivity: Positivity) -> Option<f64> {
    trailing_mean(rows, column, usize::MAX, positivity)
}

/// Generic fill value for a column. Critical columns prefer strictly
/// positive values and only then accept the unfiltered mean.
pub fn fallback_value(
    rows: &[HistoryRow],
    column: usize,
    window: usize,
    critical: bool,
) -> Option<f64> {
    if critical {
        trailing_mean(rows, column, window, Positivity::StrictlyPositive)
            .or_else(|| trailing_mean(rows, column, window, Positivity::Any))
    } else {
        trailing_mean(rows, column, window, Positivity::Any)
    }
}
