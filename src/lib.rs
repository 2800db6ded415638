//! Energy Cost Forecaster
//!
//! Recursive forecast synthesis for residential electricity cost at hour, day,
//! week and month granularity. Each future period gets a synthesized feature
//! vector built from calendar analogs, lag lookups over a growing working
//! history, and trailing-mean fallbacks; the trained regressor for that
//! granularity turns it into a cost prediction that feeds the next period.

pub mod config;
pub mod domain;
pub mod forecast;
pub mod history;
pub mod ml;
pub mod store;
pub mod telemetry;

pub use domain::{Granularity, Period, PredictionRecord};
pub use forecast::{ForecastEngine, ForecastError, ForecastReport};
pub use history::{FeatureTable, WorkingHistory};
pub use ml::{FeatureVector, Prediction, Regressor};
