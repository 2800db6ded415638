//! Feature synthesis for a single future period.
//!
//! Order of precedence per slot:
//! 1. values copied from the calendar analog, if one exists
//! 2. calendar fields from the target period itself
//! 3. lag features through the lag resolver
//! 4. critical-feature guard, pre-fill pass
//! 5. trailing-mean fill for anything still missing
//! 6. critical-feature guard, final pass

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::trace;

use super::analog::{calendar_matches, select_analog, AnalogScope};
use super::error::ForecastError;
use super::fallback::{fallback_value, history_mean, Positivity};
use super::guard::{guard_critical, GuardPass};
use super::lag::{resolve_lag, LagSource};
use super::plan::{FeaturePlan, SlotKind, TemporalField};
use crate::domain::{Granularity, Period};
use crate::history::WorkingHistory;
use crate::ml::FeatureVector;

/// Hour assigned to aggregated streams when nothing better is known
const DEFAULT_HOUR: f64 = 12.0;

/// Provenance of one synthesized slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueSource {
    /// Copied from the calendar analog row
    Analog,
    Calendar,
    Lag(LagSource),
    Fallback,
    Guard,
    Missing,
}

/// Result of synthesizing one period
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Model input, ordered as the model expects
    pub features: FeatureVector,
    /// Full-width history row: seed values overwritten by the synthesized slots
    pub row: Vec<f64>,
    /// Timestamp of the analog row, if one was found
    pub analog: Option<NaiveDateTime>,
    pub sources: Vec<ValueSource>,
}

#[derive(Debug, Clone)]
pub struct FeatureSynthesizer {
    plan: Arc<FeaturePlan>,
    scope: AnalogScope,
}

impl FeatureSynthesizer {
    pub fn new(plan: Arc<FeaturePlan>, scope: AnalogScope) -> Self {
        Self { plan, scope }
    }

    pub fn plan(&self) -> &FeaturePlan {
        &self.plan
    }

    /// Build a complete feature vector for `target` from `history`
    pub fn synthesize(
        &self,
        history: &WorkingHistory,
        target: &Period,
    ) -> Result<Synthesis, ForecastError> {
        let granularity = target.granularity;
        let analog = select_analog(history, target, self.scope);
        // columns outside the plan are carried over from the analog or the newest row
        let seed = match analog {
            Some(row) => row,
            None => history
                .last()
                .ok_or(ForecastError::MissingHistory { granularity })?,
        };

        let slots = self.plan.slots();
        let mut values = vec![f64::NAN; slots.len()];
        let mut sources = vec![ValueSource::Missing; slots.len()];

        for (i, slot) in slots.iter().enumerate() {
            match &slot.kind {
                SlotKind::Temporal(field) => {
                    values[i] = self.temporal_value(*field, history, target, slot.column);
                    sources[i] = ValueSource::Calendar;
                }
                SlotKind::Lag { lag, base_column } => {
                    if let Some(r) = resolve_lag(history, target, lag, slot.column, *base_column) {
                        values[i] = r.value;
                        sources[i] = ValueSource::Lag(r.source);
                    }
                }
                SlotKind::Plain => {
                    if let (Some(row), Some(column)) = (analog, slot.column) {
                        let v = row.value(column);
                        if v.is_finite() {
                            values[i] = v;
                            sources[i] = ValueSource::Analog;
                        }
                    }
                }
            }
        }

        let mark_guarded = |values: &[f64], sources: &mut [ValueSource], before: &[f64]| {
            for (i, (now, was)) in values.iter().zip(before).enumerate() {
                if now.to_bits() != was.to_bits() {
                    sources[i] = ValueSource::Guard;
                }
            }
        };

        let before = values.clone();
        guard_critical(&mut values, &self.plan, history, target, GuardPass::BeforeFill);
        mark_guarded(&values, &mut sources, &before);

        let window = granularity.fallback_window();
        for (i, slot) in slots.iter().enumerate() {
            if values[i].is_finite() {
                continue;
            }
            let column = match &slot.kind {
                SlotKind::Lag { base_column, .. } => slot.column.or(*base_column),
                _ => slot.column,
            };
            if let Some(v) = column.and_then(|c| fallback_value(history.rows(), c, window, slot.critical)) {
                values[i] = v;
                sources[i] = ValueSource::Fallback;
            }
        }

        let before = values.clone();
        guard_critical(&mut values, &self.plan, history, target, GuardPass::Final);
        mark_guarded(&values, &mut sources, &before);

        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::UnresolvableFeature {
                granularity,
                feature: slots[i].name.clone(),
            });
        }

        let mut row = seed.values.clone();
        for (slot, value) in slots.iter().zip(&values) {
            if let Some(column) = slot.column {
                row[column] = *value;
            }
        }

        trace!(
            %granularity,
            period = %target,
            analog = ?analog.map(|r| r.timestamp),
            "synthesized feature vector"
        );

        Ok(Synthesis {
            features: FeatureVector::from_named(self.plan.names().zip(values)),
            row,
            analog: analog.map(|r| r.timestamp),
            sources,
        })
    }

    fn temporal_value(
        &self,
        field: TemporalField,
        history: &WorkingHistory,
        target: &Period,
        column: Option<usize>,
    ) -> f64 {
        match field {
            TemporalField::DayOfWeek => f64::from(target.day_of_week()),
            TemporalField::Month => f64::from(target.month()),
            TemporalField::Hour if target.granularity == Granularity::Hour => {
                f64::from(target.hour())
            }
            // aggregated streams carry a mean hour, not the period start's hour 0
            TemporalField::Hour => column
                .and_then(|c| {
                    let (sum, count) = calendar_matches(history, target, self.scope)
                        .map(|r| r.value(c))
                        .filter(|v| v.is_finite())
                        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                    (count > 0)
                        .then(|| sum / count as f64)
                        .or_else(|| history_mean(history.rows(), c, Positivity::Any))
                })
                .unwrap_or(DEFAULT_HOUR),
        }
    }
}
