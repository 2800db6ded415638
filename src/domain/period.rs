//! Granularities and calendar periods.
//!
//! Every forecast stream advances one [`Period`] at a time. Periods are
//! identified by their start timestamp, which is always aligned to the
//! granularity (top of the hour, midnight, Monday midnight, first of month).

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Time resolution of a forecast stream
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

impl Granularity {
    /// All granularities, finest first
    pub const ALL: [Granularity; 4] = [
        Granularity::Hour,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
    ];

    /// Align a timestamp to the start of the period that contains it
    pub fn floor(self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        match self {
            Self::Hour => date.and_hms_opt(ts.hour(), 0, 0).unwrap_or(ts),
            Self::Day => date.and_time(NaiveTime::MIN),
            Self::Week => {
                let back = i64::from(date.weekday().num_days_from_monday());
                (date - Duration::days(back)).and_time(NaiveTime::MIN)
            }
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
        }
    }

    /// Move `periods` units forward (negative moves back). `None` on calendar overflow.
    pub fn shift(self, ts: NaiveDateTime, periods: i64) -> Option<NaiveDateTime> {
        match self {
            Self::Hour => ts.checked_add_signed(Duration::try_hours(periods)?),
            Self::Day => ts.checked_add_signed(Duration::try_days(periods)?),
            Self::Week => ts.checked_add_signed(Duration::try_weeks(periods)?),
            Self::Month => {
                let months = Months::new(u32::try_from(periods.unsigned_abs()).ok()?);
                if periods >= 0 {
                    ts.checked_add_months(months)
                } else {
                    ts.checked_sub_months(months)
                }
            }
        }
    }

    /// Trailing window used by the generic fallback averager
    pub fn fallback_window(self) -> usize {
        match self {
            Self::Hour => 24,
            Self::Day | Self::Week => 30,
            Self::Month => 12,
        }
    }

    /// Trailing window used by the final critical-feature repair
    pub fn guard_window(self) -> usize {
        match self {
            Self::Hour => 168,
            Self::Day | Self::Week | Self::Month => 30,
        }
    }

    /// Label used when the orchestrator falls back to a one-step forecast
    pub fn next_label(self) -> &'static str {
        match self {
            Self::Hour => "next_hour",
            Self::Day => "next_day",
            Self::Week => "next_week",
            Self::Month => "next_month",
        }
    }
}

/// A single addressable time slot at a given granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub granularity: Granularity,
    pub start: NaiveDateTime,
}

impl Period {
    /// The period of `granularity` that contains `ts`
    pub fn containing(granularity: Granularity, ts: NaiveDateTime) -> Self {
        Self {
            granularity,
            start: granularity.floor(ts),
        }
    }

    pub fn next(&self) -> Option<Self> {
        self.offset(1)
    }

    pub fn offset(&self, periods: i64) -> Option<Self> {
        Some(Self {
            granularity: self.granularity,
            start: self.granularity.shift(self.start, periods)?,
        })
    }

    pub fn hour(&self) -> u32 {
        self.start.hour()
    }

    /// Day of week, Monday = 0
    pub fn day_of_week(&self) -> u32 {
        self.start.weekday().num_days_from_monday()
    }

    pub fn month(&self) -> u32 {
        self.start.month()
    }

    /// Human-readable label, e.g. `hour_2025-01-02 03:00` or `month_2025-01`
    pub fn label(&self) -> String {
        let stamp = match self.granularity {
            Granularity::Hour => self.start.format("%Y-%m-%d %H:00"),
            Granularity::Day | Granularity::Week => self.start.format("%Y-%m-%d"),
            Granularity::Month => self.start.format("%Y-%m"),
        };
        format!("{}_{}", self.granularity, stamp)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
