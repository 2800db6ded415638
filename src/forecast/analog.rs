//! Calendar analog selection.
//!
//! An analog is a past period that sits at the same place in the calendar
//! as the target: same month for monthly streams, same month and weekday for
//! daily/weekly streams, and additionally the same hour for hourly streams.
//! The most recent match wins; older years get no extra weight.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::domain::{Granularity, Period};
use crate::history::{HistoryRow, WorkingHistory};

/// Which rows analog search may draw from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalogScope {
    /// Feature Store rows plus rows synthesized earlier in the run
    #[default]
    Working,
    /// Feature Store rows only
    Observed,
}

/// Whether `candidate` is calendar-aligned with `target`
pub fn is_calendar_match(candidate: NaiveDateTime, target: &Period) -> bool {
    let month = candidate.month() == target.month();
    let weekday = candidate.weekday().num_days_from_monday() == target.day_of_week();
    match target.granularity {
        Granularity::Month => month,
        Granularity::Day | Granularity::Week => month && weekday,
        Granularity::Hour => month && weekday && candidate.hour() == target.hour(),
    }
}

fn candidates<'h>(history: &'h WorkingHistory, target: &Period, scope: AnalogScope) -> &'h [HistoryRow] {
    let before = history.rows_before(target.start);
    match scope {
        AnalogScope::Working => before,
        AnalogScope::Observed => {
            let observed = history.observed_rows().len().min(before.len());
            &before[..observed]
        }
    }
}

/// All calendar matches strictly before the target, newest first
pub fn calendar_matches<'h>(
    history: &'h WorkingHistory,
    target: &'h Period,
    scope: AnalogScope,
) -> impl Iterator<Item = &'h HistoryRow> + 'h {
    candidates(history, target, scope)
        .iter()
        .rev()
        .filter(move |row| is_calendar_match(row.timestamp, target))
}

/// The most recent calendar match strictly before the target, if any
pub fn select_analog<'h>(
    history: &'h WorkingHistory,
    target: &Period,
    scope: AnalogScope,
) -> Option<&'h HistoryRow> {
    candidates(history, target, scope)
        .iter()
        .rev()
        .find(|row| is_calendar_match(row.timestamp, target))
}
