//! Recursive horizon loop for one granularity.
//!
//! `AT(last) -> ADVANCING -> DONE`: each iteration synthesizes the next
//! period, calls the model, clamps, emits a record and appends the row to the
//! working history so later lags can see it. Any failure ends the loop and
//! keeps what was already emitted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::ForecastError;
use super::synthesizer::{FeatureSynthesizer, Synthesis};
use crate::domain::{Granularity, Period, PredictionRecord};
use crate::history::WorkingHistory;
use crate::ml::{FeatureVector, Regressor};

/// Periods whose critical inputs are logged at debug level
const TRACED_STEPS: usize = 3;

/// Per-granularity loop bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonSettings {
    pub max_iterations: usize,
    pub max_horizon_periods: usize,
}

impl HorizonSettings {
    pub fn for_granularity(granularity: Granularity) -> Self {
        let (max_iterations, max_horizon_periods) = match granularity {
            // ~150 days of hours
            Granularity::Hour => (3600, 3600),
            Granularity::Day => (180, 180),
            Granularity::Week => (32, 32),
            Granularity::Month => (12, 18),
        };
        Self {
            max_iterations,
            max_horizon_periods,
        }
    }
}

#[derive(Debug)]
pub enum StopReason {
    /// The next period lies beyond the horizon limit
    HorizonReached,
    /// `max_iterations` records were emitted
    IterationCap,
    /// Synthesis or the model failed; earlier records are kept
    Aborted(ForecastError),
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HorizonReached => "horizon_reached",
            Self::IterationCap => "iteration_cap",
            Self::Aborted(_) => "aborted",
        }
    }
}

#[derive(Debug)]
pub struct HorizonOutcome {
    pub granularity: Granularity,
    pub records: Vec<PredictionRecord>,
    pub stop: StopReason,
}

/// One completed iteration
#[derive(Debug, Clone)]
pub struct Step {
    pub record: PredictionRecord,
    pub synthesis: Synthesis,
}

/// Cost cannot be negative
pub fn clamp_prediction(raw: f64) -> f64 {
    raw.max(0.0)
}

pub struct HorizonController {
    synthesizer: FeatureSynthesizer,
    model: Arc<dyn Regressor>,
    target: String,
    settings: HorizonSettings,
}

impl HorizonController {
    pub fn new(
        synthesizer: FeatureSynthesizer,
        model: Arc<dyn Regressor>,
        target: impl Into<String>,
        settings: HorizonSettings,
    ) -> Self {
        Self {
            synthesizer,
            model,
            target: target.into(),
            settings,
        }
    }

    pub fn settings(&self) -> HorizonSettings {
        self.settings
    }

    fn granularity(&self) -> Granularity {
        self.synthesizer.plan().granularity()
    }

    /// Horizon limit for a history ending at `last`: the earlier of the
    /// requested end and `last + max_horizon_periods`
    pub fn limit(&self, last: NaiveDateTime, requested: NaiveDateTime) -> NaiveDateTime {
        let periods = i64::try_from(self.settings.max_horizon_periods).unwrap_or(i64::MAX);
        self.granularity()
            .shift(last, periods)
            .map_or(requested, |cap| cap.min(requested))
    }

    /// Advance from `first` until `limit` or the iteration cap
    pub fn run(
        &self,
        history: &mut WorkingHistory,
        first: Period,
        limit: NaiveDateTime,
    ) -> HorizonOutcome {
        let granularity = self.granularity();
        let mut records = Vec::new();
        let mut current = first;

        let stop = loop {
            if current.start > limit {
                break StopReason::HorizonReached;
            }
            if records.len() >= self.settings.max_iterations {
                break StopReason::IterationCap;
            }
            match self.step(history, &current) {
                Ok(step) => {
                    if records.len() < TRACED_STEPS {
                        self.trace_critical(&step);
                    }
                    records.push(step.record);
                }
                Err(e) => break StopReason::Aborted(e),
            }
            match current.next() {
                Some(next) => current = next,
                None => {
                    break StopReason::Aborted(ForecastError::TimestampOverflow {
                        granularity,
                        after: current.start,
                    })
                }
            }
        };

        match &stop {
            StopReason::Aborted(e) => warn!(
                %granularity,
                emitted = records.len(),
                error = %e,
                kind = e.kind(),
                "forecast run aborted, keeping partial results"
            ),
            other => info!(
                %granularity,
                emitted = records.len(),
                stop_reason = other.as_str(),
                "forecast run finished"
            ),
        }

        HorizonOutcome {
            granularity,
            records,
            stop,
        }
    }

    /// Synthesize and predict `target`, then append it to `history`
    pub fn step(
        &self,
        history: &mut WorkingHistory,
        target: &Period,
    ) -> Result<Step, ForecastError> {
        let synthesis = self.synthesizer.synthesize(history, target)?;
        let prediction = self.predict(&synthesis.features)?;

        let mut row = synthesis.row.clone();
        if let Some(column) = self.synthesizer.plan().target_column() {
            row[column] = prediction;
        }
        history.push_synthesized(target.start, row)?;

        debug!(
            granularity = %target.granularity,
            period = %target,
            prediction,
            "predicted period"
        );
        Ok(Step {
            record: PredictionRecord::new(&self.target, prediction, target),
            synthesis,
        })
    }

    /// One prediction for `target` without touching the history
    pub fn predict_once(
        &self,
        history: &WorkingHistory,
        target: &Period,
    ) -> Result<PredictionRecord, ForecastError> {
        let synthesis = self.synthesizer.synthesize(history, target)?;
        let prediction = self.predict(&synthesis.features)?;
        Ok(PredictionRecord::new(&self.target, prediction, target))
    }

    /// Call the model and clamp its output
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, ForecastError> {
        let granularity = self.granularity();
        let raw = self
            .model
            .predict(features)
            .map_err(|e| ForecastError::ModelInvocation {
                granularity,
                message: format!("{e:#}"),
            })?
            .value;
        if !raw.is_finite() {
            return Err(ForecastError::ModelInvocation {
                granularity,
                message: format!("non-finite output {raw}"),
            });
        }
        Ok(clamp_prediction(raw))
    }

    fn trace_critical(&self, step: &Step) {
        let critical: Vec<(&str, f64)> = self
            .synthesizer
            .plan()
            .slots()
            .iter()
            .zip(step.synthesis.features.features.iter())
            .filter(|(slot, _)| slot.critical)
            .map(|(slot, v)| (slot.name.as_str(), *v))
            .collect();
        debug!(
            granularity = %self.granularity(),
            period = %step.record.label,
            analog = ?step.synthesis.analog,
            critical = ?critical,
            prediction = step.record.prediction,
            "critical inputs"
        );
    }
}
