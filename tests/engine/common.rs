use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use energy_cost_forecaster::forecast::{FeatureConventions, ForecastJob, HorizonSettings};
use energy_cost_forecaster::ml::{FeatureVector, FnRegressor, Regressor};
use energy_cost_forecaster::{FeatureTable, Granularity};

pub const TARGET: &str = "Estimated_Hourly_Cost_USD";

pub fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// `len` rows starting at `start`: cost, CAISO Total, temp
pub fn table(granularity: Granularity, start: NaiveDateTime, len: usize) -> FeatureTable {
    let rows = (0..len)
        .map(|i| {
            let ts = granularity.shift(start, i as i64).unwrap();
            let cost = (i % 24) as f64 * 0.1 + 0.5;
            (ts, vec![cost, 20_000.0 + i as f64, 15.0 + (i % 7) as f64])
        })
        .collect();
    FeatureTable::new(
        granularity,
        names(&[TARGET, "CAISO Total", "temp"]),
        rows,
    )
    .unwrap()
}

pub fn job(table: FeatureTable, model: Arc<dyn Regressor>, horizon: HorizonSettings) -> ForecastJob {
    let lag = format!("{TARGET}_lag_1");
    ForecastJob::new(
        Arc::new(table),
        model,
        &names(&["hour", "dayofweek", "month", &lag, "CAISO Total", "temp"]),
        TARGET,
        &FeatureConventions::default(),
        horizon,
    )
}

/// Returns `value` until the `fail_on`-th call (1-based), which errors
pub fn failing_on(fail_on: usize, value: f64) -> Arc<dyn Regressor> {
    let calls = AtomicUsize::new(0);
    Arc::new(FnRegressor::new(move |_: &FeatureVector| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == fail_on {
            anyhow::bail!("model failure on call {n}");
        }
        Ok(value)
    }))
}

pub fn constant(value: f64) -> Arc<dyn Regressor> {
    Arc::new(FnRegressor::new(move |_: &FeatureVector| Ok(value)))
}

pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}
