use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::Granularity;
use crate::history::HistoryError;

/// Failures of the forecasting core. All of them are scoped to one granularity.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("no history available for {granularity} forecasts")]
    MissingHistory { granularity: Granularity },

    #[error("feature '{feature}' cannot be resolved from {granularity} history")]
    UnresolvableFeature {
        granularity: Granularity,
        feature: String,
    },

    #[error("{granularity} model failed: {message}")]
    ModelInvocation {
        granularity: Granularity,
        message: String,
    },

    #[error("{granularity} period after {after} is out of calendar range")]
    TimestampOverflow {
        granularity: Granularity,
        after: NaiveDateTime,
    },

    #[error("{granularity} forecast task failed: {message}")]
    TaskFailed {
        granularity: Granularity,
        message: String,
    },

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl ForecastError {
    /// Short machine-friendly tag for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHistory { .. } => "missing_history",
            Self::UnresolvableFeature { .. } => "unresolvable_feature",
            Self::ModelInvocation { .. } => "model_invocation",
            Self::TimestampOverflow { .. } => "timestamp_overflow",
            Self::TaskFailed { .. } => "task_failed",
            Self::History(_) => "history",
        }
    }
}
