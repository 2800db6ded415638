use chrono::Duration;
use std::sync::Arc;

use energy_cost_forecaster::forecast::lag::{resolve_lag, LagSource};
use energy_cost_forecaster::forecast::{
    AnalogScope, EngineSettings, FeatureConventions, FeaturePlan, FeatureSynthesizer,
    ForecastEngine, HorizonController, HorizonSettings, LagFeature, RunStatus, StopReason,
    ValueSource,
};
use energy_cost_forecaster::ml::{FeatureVector, FnRegressor};
use energy_cost_forecaster::{FeatureTable, Granularity, Period, WorkingHistory};

use super::common::{at, constant, failing_on, hours, job, names, table, TARGET};

fn settings() -> EngineSettings {
    EngineSettings {
        target: TARGET.to_string(),
        ..EngineSettings::default()
    }
}

#[test]
fn single_day_history_falls_back_to_its_mean() {
    let start = at(2024, 1, 1, 0);
    let rows = (0..24)
        .map(|h| (start + hours(h), vec![h as f64, h as f64]))
        .collect();
    let table = FeatureTable::new(Granularity::Hour, names(&["cost", "load"]), rows).unwrap();
    let history = WorkingHistory::from_table(&table);
    let plan = FeaturePlan::resolve(
        Granularity::Hour,
        &names(&["load", "cost_lag_36", "load_lag_48"]),
        table.schema(),
        "cost",
        &FeatureConventions::default(),
    );
    let synth = FeatureSynthesizer::new(Arc::new(plan), AnalogScope::Working);

    let s = synth
        .synthesize(&history, &Period::containing(Granularity::Hour, at(2024, 1, 2, 0)))
        .unwrap();
    assert_eq!(s.analog, None);
    assert_eq!(s.features.get("load"), Some(11.5));
    assert_eq!(s.sources[0], ValueSource::Fallback);
    assert_eq!(s.features.get("cost_lag_36"), Some(11.5));
    assert_eq!(s.features.get("load_lag_48"), Some(11.5));
}

#[test]
fn plain_feature_without_analog_averages_last_window() {
    // 48 hourly rows, load = row index; the target's Wednesday 00:00 has no analog
    let start = at(2024, 1, 1, 0);
    let rows = (0..48)
        .map(|i| (start + hours(i), vec![1.0, i as f64]))
        .collect();
    let table = FeatureTable::new(Granularity::Hour, names(&["cost", "load"]), rows).unwrap();
    let history = WorkingHistory::from_table(&table);
    let plan = FeaturePlan::resolve(
        Granularity::Hour,
        &names(&["load"]),
        table.schema(),
        "cost",
        &FeatureConventions::default(),
    );
    let synth = FeatureSynthesizer::new(Arc::new(plan), AnalogScope::Working);

    let s = synth
        .synthesize(&history, &Period::containing(Granularity::Hour, at(2024, 1, 3, 0)))
        .unwrap();
    assert_eq!(s.analog, None);
    // mean of 24..=47
    assert_eq!(s.features.get("load"), Some(35.5));
}

#[test]
fn monthly_lag_7_resolves_like_lag_1() {
    let history = WorkingHistory::from_table(&table(Granularity::Month, at(2023, 1, 1, 0), 18));
    let target = Period::containing(Granularity::Month, at(2024, 7, 1, 0));
    let resolve = |name: &str| {
        let lag = LagFeature::parse(name, "_lag_").unwrap();
        resolve_lag(&history, &target, &lag, None, Some(0))
    };

    let lag_1 = resolve(&format!("{TARGET}_lag_1")).unwrap();
    let lag_7 = resolve(&format!("{TARGET}_lag_7")).unwrap();
    assert_eq!(lag_1, lag_7);
    assert_eq!(lag_1.source, LagSource::Lookup(at(2024, 6, 1, 0)));
}

#[test]
fn model_failure_on_fifth_of_thirty_keeps_four() {
    let history_table = table(Granularity::Hour, at(2024, 1, 1, 0), 72);
    let job = job(
        history_table.clone(),
        failing_on(5, 1.0),
        HorizonSettings::for_granularity(Granularity::Hour),
    );
    let controller = HorizonController::new(
        FeatureSynthesizer::new(Arc::clone(&job.plan), AnalogScope::Working),
        Arc::clone(&job.model),
        TARGET,
        job.horizon,
    );
    let mut history = WorkingHistory::from_table(&history_table);
    let first = Period::containing(Granularity::Hour, at(2024, 1, 4, 0));
    let limit = first.start + hours(29);

    let outcome = controller.run(&mut history, first, limit);
    assert_eq!(outcome.records.len(), 4);
    assert!(matches!(outcome.stop, StopReason::Aborted(_)));
}

#[test]
fn negative_output_is_emitted_as_zero() {
    let engine = ForecastEngine::new(settings()).with_job(job(
        table(Granularity::Day, at(2024, 1, 1, 0), 60),
        constant(-0.02),
        HorizonSettings::for_granularity(Granularity::Day),
    ));
    let report = engine.forecast(at(2024, 2, 20, 0));

    assert!(!report.records.is_empty());
    assert!(report.records.iter().all(|r| r.prediction == 0.0));
}

#[test]
fn calendar_analog_values_are_copied_through() {
    // Jan 2024 daily history; target Monday 2025-01-06 matches Monday 2024-01-29
    let history_table = table(Granularity::Day, at(2024, 1, 1, 0), 31);
    let history = WorkingHistory::from_table(&history_table);
    let plan = FeaturePlan::resolve(
        Granularity::Day,
        &names(&["temp", "CAISO Total", "month"]),
        history_table.schema(),
        TARGET,
        &FeatureConventions::default(),
    );
    let synth = FeatureSynthesizer::new(Arc::new(plan), AnalogScope::Working);

    let s = synth
        .synthesize(&history, &Period::containing(Granularity::Day, at(2025, 1, 6, 0)))
        .unwrap();
    let analog = s.analog.unwrap();
    assert_eq!(analog, at(2024, 1, 29, 0));
    let row = history.latest_at_or_before(analog).unwrap();
    assert_eq!(s.features.get("temp"), Some(row.value(2)));
    assert_eq!(s.features.get("CAISO Total"), Some(row.value(1)));
}

#[test]
fn granularities_run_independently_and_merge_sorted() {
    let engine = ForecastEngine::new(settings())
        .with_job(job(
            table(Granularity::Hour, at(2024, 3, 1, 0), 24 * 14),
            constant(0.4),
            HorizonSettings::for_granularity(Granularity::Hour),
        ))
        .with_job(job(
            table(Granularity::Day, at(2024, 1, 1, 0), 75),
            failing_on(1, 2.0),
            HorizonSettings::for_granularity(Granularity::Day),
        ))
        .with_job(job(
            table(Granularity::Month, at(2022, 1, 1, 0), 27),
            constant(60.0),
            HorizonSettings::for_granularity(Granularity::Month),
        ));
    let report = engine.forecast(at(2024, 3, 14, 12));

    let status: Vec<_> = report.runs.iter().map(|r| (r.granularity, r.status)).collect();
    assert_eq!(
        status,
        vec![
            (Granularity::Hour, RunStatus::Finished),
            (Granularity::Day, RunStatus::Failed),
            (Granularity::Month, RunStatus::Finished),
        ]
    );
    assert!(report.records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(report.records_for(Granularity::Day).next().is_none());
    // hourly history ends 2024-03-14 23:00, horizon 2024-04-14 12:00
    assert_eq!(report.records_for(Granularity::Hour).count(), 31 * 24 - 11);
    assert_eq!(report.records_for(Granularity::Month).count(), 1);
}

#[test]
fn lag_features_see_earlier_predictions() {
    let history_table = table(Granularity::Day, at(2024, 1, 1, 0), 10);
    let model = Arc::new(FnRegressor::new(|f: &FeatureVector| {
        let lag = f
            .get(&format!("{TARGET}_lag_1"))
            .ok_or_else(|| anyhow::anyhow!("lag missing"))?;
        Ok(lag * 2.0)
    }));
    let engine = ForecastEngine::new(settings()).with_job(job(
        history_table.clone(),
        model,
        HorizonSettings::for_granularity(Granularity::Day),
    ));
    let report = engine.forecast(at(2024, 1, 1, 0));

    let last_cost = history_table.value(9, TARGET).unwrap();
    let predictions: Vec<f64> = report.records.iter().map(|r| r.prediction).collect();
    assert!(predictions.len() > 3);
    for (i, p) in predictions.iter().enumerate() {
        let expected = last_cost * 2f64.powi(i as i32 + 1);
        assert!((p - expected).abs() < 1e-9, "step {i}: {p} != {expected}");
    }
    assert_eq!(report.records[0].timestamp, at(2024, 1, 11, 0));
    assert_eq!(
        report.records[1].timestamp - report.records[0].timestamp,
        Duration::days(1)
    );
}
