use chrono::{Duration, NaiveDateTime};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::analog::AnalogScope;
use super::error::ForecastError;
use super::horizon::{HorizonController, HorizonSettings, StopReason};
use super::plan::{FeatureConventions, FeaturePlan, SlotKind, TemporalField};
use super::synthesizer::FeatureSynthesizer;
use crate::config::ForecastConfig;
use crate::domain::{Granularity, Period, PredictionRecord};
use crate::history::{FeatureTable, HistoryRow, WorkingHistory};
use crate::ml::{FeatureVector, ModelRegistry, Regressor};

/// Everything needed to forecast one granularity
#[derive(Clone)]
pub struct ForecastJob {
    pub table: Arc<FeatureTable>,
    pub model: Arc<dyn Regressor>,
    pub plan: Arc<FeaturePlan>,
    pub horizon: HorizonSettings,
}

impl ForecastJob {
    /// Resolve the model's feature list against the table once, up front
    pub fn new(
        table: Arc<FeatureTable>,
        model: Arc<dyn Regressor>,
        features: &[String],
        target: &str,
        conventions: &FeatureConventions,
        horizon: HorizonSettings,
    ) -> Self {
        let plan = FeaturePlan::resolve(
            table.granularity(),
            features,
            table.schema(),
            target,
            conventions,
        );
        Self {
            table,
            model,
            plan: Arc::new(plan),
            horizon,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.table.granularity()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Name of the predicted column
    pub target: String,
    /// Forecast reach past `as_of`, in days
    pub lead_days: u32,
    pub analog_scope: AnalogScope,
    /// Re-predict the month containing `as_of` if the history already has a row for it
    pub include_open_month: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            target: "Estimated_Hourly_Cost_USD".to_string(),
            lead_days: 31,
            analog_scope: AnalogScope::Working,
            include_open_month: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Ran until the horizon or the iteration cap
    Finished,
    /// Aborted after emitting at least one record
    Partial,
    /// No gap to the horizon; one next-period prediction
    SingleStep,
    /// No history
    Skipped,
    /// Produced nothing
    Failed,
}

#[derive(Debug, Clone)]
pub struct GranularityRun {
    pub granularity: Granularity,
    pub records: Vec<PredictionRecord>,
    pub status: RunStatus,
}

impl GranularityRun {
    fn empty(granularity: Granularity, status: RunStatus) -> Self {
        Self {
            granularity,
            records: Vec::new(),
            status,
        }
    }
}

/// Merged output of one engine run
#[derive(Debug, Clone, Default)]
pub struct ForecastReport {
    /// All records, ascending by timestamp
    pub records: Vec<PredictionRecord>,
    pub runs: Vec<GranularityRun>,
    /// True when every run came back empty and the one-step fallback was used
    pub fallback_used: bool,
}

impl ForecastReport {
    pub fn records_for(&self, granularity: Granularity) -> impl Iterator<Item = &PredictionRecord> {
        self.records
            .iter()
            .filter(move |r| r.granularity == granularity)
    }
}

/// Multi-granularity orchestrator
pub struct ForecastEngine {
    settings: EngineSettings,
    jobs: Vec<ForecastJob>,
}

impl ForecastEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            jobs: Vec::new(),
        }
    }

    /// Add or replace the job for a granularity
    pub fn with_job(mut self, job: ForecastJob) -> Self {
        self.jobs.retain(|j| j.granularity() != job.granularity());
        self.jobs.push(job);
        self.jobs.sort_by_key(ForecastJob::granularity);
        self
    }

    /// Wire enabled granularities that have both a feature table and a model
    pub fn from_config(
        config: &ForecastConfig,
        mut tables: HashMap<Granularity, FeatureTable>,
        registry: &ModelRegistry,
    ) -> Self {
        let mut engine = Self::new(config.engine_settings());
        for granularity in Granularity::ALL {
            let settings = config.granularity(granularity);
            if !settings.enabled {
                info!(%granularity, "granularity disabled by configuration");
                continue;
            }
            let Some(table) = tables.remove(&granularity) else {
                warn!(%granularity, "no feature table, granularity skipped");
                continue;
            };
            let Some(model) = registry.get(granularity) else {
                warn!(%granularity, "no model registered, granularity skipped");
                continue;
            };
            engine = engine.with_job(ForecastJob::new(
                Arc::new(table),
                Arc::clone(&model.model),
                &model.features,
                &config.target,
                &config.conventions,
                settings.horizon(granularity),
            ));
        }
        engine
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn jobs(&self) -> &[ForecastJob] {
        &self.jobs
    }

    /// Run every granularity in turn
    pub fn forecast(&self, as_of: NaiveDateTime) -> ForecastReport {
        let runs = self
            .jobs
            .iter()
            .map(|job| run_job(job, &self.settings, as_of))
            .collect();
        self.merge(runs)
    }

    /// Run every granularity on the blocking pool and join the results
    pub async fn forecast_concurrent(&self, as_of: NaiveDateTime) -> ForecastReport {
        let handles = self.jobs.iter().map(|job| {
            let job = job.clone();
            let settings = self.settings.clone();
            let granularity = job.granularity();
            let handle = tokio::task::spawn_blocking(move || run_job(&job, &settings, as_of));
            async move { (granularity, handle.await) }
        });

        let runs = join_all(handles)
            .await
            .into_iter()
            .map(|(granularity, joined)| {
                joined.unwrap_or_else(|e| {
                    let error = ForecastError::TaskFailed {
                        granularity,
                        message: e.to_string(),
                    };
                    warn!(%granularity, error = %error, "forecast task failed");
                    GranularityRun::empty(granularity, RunStatus::Failed)
                })
            })
            .collect();
        self.merge(runs)
    }

    fn merge(&self, runs: Vec<GranularityRun>) -> ForecastReport {
        let mut records: Vec<PredictionRecord> = runs
            .iter()
            .flat_map(|run| run.records.iter().cloned())
            .collect();

        let fallback_used = records.is_empty() && !self.jobs.is_empty();
        if fallback_used {
            warn!("no granularity produced predictions, falling back to one-step forecasts");
            records = self
                .jobs
                .iter()
                .filter_map(|job| single_step_fallback(job, &self.settings))
                .collect();
        }

        // stable: equal timestamps keep granularity order
        records.sort_by_key(|r| r.timestamp);
        ForecastReport {
            records,
            runs,
            fallback_used,
        }
    }
}

/// End of the requested horizon for `granularity`: `as_of + lead_days`,
/// floored to the period (weekly streams floor to the day)
pub fn horizon_end(
    granularity: Granularity,
    as_of: NaiveDateTime,
    lead_days: u32,
) -> Option<NaiveDateTime> {
    let end = as_of.checked_add_signed(Duration::try_days(i64::from(lead_days))?)?;
    Some(match granularity {
        Granularity::Week => Granularity::Day.floor(end),
        other => other.floor(end),
    })
}

fn controller(job: &ForecastJob, settings: &EngineSettings) -> HorizonController {
    HorizonController::new(
        FeatureSynthesizer::new(Arc::clone(&job.plan), settings.analog_scope),
        Arc::clone(&job.model),
        settings.target.clone(),
        job.horizon,
    )
}

/// Run the horizon loop for one job
pub fn run_job(job: &ForecastJob, settings: &EngineSettings, as_of: NaiveDateTime) -> GranularityRun {
    let granularity = job.granularity();
    let Some(last) = job.table.last_timestamp() else {
        let error = ForecastError::MissingHistory { granularity };
        warn!(%granularity, error = %error, "skipping granularity");
        return GranularityRun::empty(granularity, RunStatus::Skipped);
    };
    let last_period = Period::containing(granularity, last);

    let reopen = settings.include_open_month
        && granularity == Granularity::Month
        && last_period == Period::containing(Granularity::Month, as_of)
        && job.table.len() > 1;
    let (mut history, first) = if reopen {
        (
            WorkingHistory::from_table_until(&job.table, last_period.start),
            Some(last_period),
        )
    } else {
        (WorkingHistory::from_table(&job.table), last_period.next())
    };

    let (Some(first), Some(requested)) = (
        first,
        horizon_end(granularity, as_of, settings.lead_days),
    ) else {
        let error = ForecastError::TimestampOverflow {
            granularity,
            after: last,
        };
        warn!(%granularity, error = %error, "cannot place the first forecast period");
        return GranularityRun::empty(granularity, RunStatus::Failed);
    };

    let controller = controller(job, settings);
    let limit = controller.limit(last_period.start, requested);

    if first.start > limit {
        return match controller.predict_once(&history, &first) {
            Ok(record) => {
                info!(%granularity, period = %first, "history reaches the horizon, single-step forecast");
                GranularityRun {
                    granularity,
                    records: vec![record],
                    status: RunStatus::SingleStep,
                }
            }
            Err(e) => {
                warn!(%granularity, error = %e, kind = e.kind(), "single-step forecast failed");
                GranularityRun::empty(granularity, RunStatus::Failed)
            }
        };
    }

    let outcome = controller.run(&mut history, first, limit);
    let status = match (&outcome.stop, outcome.records.is_empty()) {
        (StopReason::Aborted(_), true) => RunStatus::Failed,
        (StopReason::Aborted(_), false) => RunStatus::Partial,
        _ => RunStatus::Finished,
    };
    GranularityRun {
        granularity,
        records: outcome.records,
        status,
    }
}

/// One next-period prediction straight from the last known row. Falls back
/// to feeding the last row's own values to the model when synthesis fails.
fn single_step_fallback(job: &ForecastJob, settings: &EngineSettings) -> Option<PredictionRecord> {
    let granularity = job.granularity();
    let history = WorkingHistory::from_table(&job.table);
    let last = history.last()?;
    let target = Period::containing(granularity, last.timestamp).next()?;
    let controller = controller(job, settings);

    let record = controller
        .predict_once(&history, &target)
        .or_else(|e| {
            warn!(%granularity, error = %e, "one-step synthesis failed, using last row as is");
            let features = persistence_vector(&job.plan, last, &target).ok_or(e)?;
            let prediction = controller.predict(&features)?;
            Ok::<_, ForecastError>(PredictionRecord::new(&settings.target, prediction, &target))
        });
    match record {
        Ok(record) => Some(record.with_label(granularity.next_label())),
        Err(e) => {
            warn!(%granularity, error = %e, kind = e.kind(), "one-step fallback failed");
            None
        }
    }
}

/// The last row's values in model order, calendar fields from `target`
fn persistence_vector(plan: &FeaturePlan, last: &HistoryRow, target: &Period) -> Option<FeatureVector> {
    let values = plan
        .slots()
        .iter()
        .map(|slot| match slot.kind {
            SlotKind::Temporal(TemporalField::Hour) if target.granularity == Granularity::Hour => {
                Some(f64::from(target.hour()))
            }
            SlotKind::Temporal(TemporalField::DayOfWeek) => Some(f64::from(target.day_of_week())),
            SlotKind::Temporal(TemporalField::Month) => Some(f64::from(target.month())),
            _ => slot
                .column
                .map(|c| last.value(c))
                .filter(|v| v.is_finite()),
        })
        .collect::<Option<Vec<f64>>>()?;
    Some(FeatureVector::from_named(plan.names().zip(values)))
}
