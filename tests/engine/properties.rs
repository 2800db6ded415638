use chrono::Duration;
use proptest::prelude::*;
use std::sync::Arc;

use energy_cost_forecaster::forecast::lag::resolve_lag;
use energy_cost_forecaster::forecast::{
    EngineSettings, ForecastEngine, HorizonSettings, LagFeature,
};
use energy_cost_forecaster::ml::{FeatureVector, FnRegressor};
use energy_cost_forecaster::{Granularity, Period, WorkingHistory};

use super::common::{at, job, table, TARGET};

fn granularity() -> impl Strategy<Value = Granularity> {
    prop_oneof![
        Just(Granularity::Hour),
        Just(Granularity::Day),
        Just(Granularity::Week),
        Just(Granularity::Month),
    ]
}

fn step(granularity: Granularity, from: chrono::NaiveDateTime) -> chrono::NaiveDateTime {
    granularity.shift(from, 1).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn records_are_contiguous_non_negative_and_capped(
        g in granularity(),
        len in 1usize..60,
        max_iterations in 1usize..40,
        lead_days in 0u32..120,
        offset in -3.0..3.0_f64,
    ) {
        let model = Arc::new(FnRegressor::new(move |f: &FeatureVector| {
            Ok(f.get("temp").unwrap_or(0.0) - 17.0 + offset)
        }));
        let horizon = HorizonSettings {
            max_iterations,
            max_horizon_periods: HorizonSettings::for_granularity(g).max_horizon_periods,
        };
        let start = at(2023, 11, 6, 0);
        let history = table(g, start, len);
        let as_of = history.last_timestamp().unwrap();
        let engine = ForecastEngine::new(EngineSettings {
            target: TARGET.to_string(),
            lead_days,
            ..EngineSettings::default()
        })
        .with_job(job(history, model, horizon));

        let report = engine.forecast(as_of);
        prop_assert!(!report.records.is_empty());
        prop_assert!(report.records.len() <= max_iterations);
        prop_assert!(report.records.iter().all(|r| r.prediction >= 0.0));
        for w in report.records.windows(2) {
            prop_assert_eq!(w[1].timestamp, step(g, w[0].timestamp));
        }
    }

    #[test]
    fn lag_resolution_is_a_pure_function(
        g in granularity(),
        len in 1usize..80,
        offset in 1u32..40,
        ahead in 1i64..10,
    ) {
        let history_table = table(g, at(2023, 1, 2, 0), len);
        let history = WorkingHistory::from_table(&history_table);
        let last = history.last_timestamp().unwrap();
        let target = Period::containing(g, last).offset(ahead).unwrap();
        let lag = LagFeature { base: TARGET.to_string(), offset };

        let first = resolve_lag(&history, &target, &lag, None, Some(0));
        let again = resolve_lag(&history.clone(), &target, &lag, None, Some(0));
        prop_assert_eq!(first, again);
        prop_assert!(first.map_or(false, |r| r.value.is_finite()));
    }
}

#[test]
fn week_periods_advance_by_seven_days() {
    let history = table(Granularity::Week, at(2024, 1, 1, 0), 8);
    let model = Arc::new(FnRegressor::new(|_: &FeatureVector| Ok(5.0)));
    let engine = ForecastEngine::new(EngineSettings {
        target: TARGET.to_string(),
        ..EngineSettings::default()
    })
    .with_job(job(history, model, HorizonSettings::for_granularity(Granularity::Week)));

    let report = engine.forecast(at(2024, 2, 20, 0));
    assert!(report.records.len() >= 2);
    assert_eq!(
        report.records[1].timestamp - report.records[0].timestamp,
        Duration::weeks(1)
    );
    assert_eq!(report.records[0].label, "week_2024-02-26");
}
