use std::fs;
use std::path::Path;

use energy_cost_forecaster::config::ForecastConfig;
use energy_cost_forecaster::forecast::ForecastEngine;
use energy_cost_forecaster::ml::ModelRegistry;
use energy_cost_forecaster::store::{load_feature_store, write_history, write_predictions};
use energy_cost_forecaster::Granularity;
use tempfile::tempdir;

use super::common::{at, TARGET};

/// Two weeks of hourly rows with a daily cost cycle
fn write_hourly_csv(dir: &Path) {
    let mut body = format!("timestamp,{TARGET},CAISO Total,hour,dayofweek,month,note\n");
    for d in 1..=14u32 {
        for h in 0..24u32 {
            let cost = 0.2 + f64::from(h) * 0.01;
            let load = 21_000 + h * 100;
            let dow = (d - 1) % 7;
            body.push_str(&format!(
                "2024-01-{d:02} {h:02}:00:00,{cost},{load},{h},{dow},1,ok\n"
            ));
        }
    }
    fs::write(dir.join("hour.csv"), body).unwrap();
}

fn write_bundle(dir: &Path, granularity: Granularity, features: &[&str], coefficients: &[f64]) {
    let bundle = serde_json::json!({
        "features": features,
        "model": { "kind": "linear", "coefficients": coefficients, "intercept": 0.05 },
    });
    fs::write(
        dir.join(format!("{granularity}_model.json")),
        serde_json::to_string_pretty(&bundle).unwrap(),
    )
    .unwrap();
}

#[test]
fn csv_store_to_prediction_file() {
    let root = tempdir().unwrap();
    let features = root.path().join("features");
    let models = root.path().join("models");
    fs::create_dir_all(&features).unwrap();
    fs::create_dir_all(&models).unwrap();

    write_hourly_csv(&features);
    let lag = format!("{TARGET}_lag_1");
    write_bundle(&models, Granularity::Hour, &["hour", &lag, "CAISO Total"], &[0.01, 0.5, 0.00001]);
    write_bundle(&models, Granularity::Day, &["dayofweek", &lag], &[0.1, 0.9]);
    // no weekly bundle: that granularity is skipped
    write_bundle(&models, Granularity::Month, &["month", &lag], &[0.0, 1.0]);

    let tables = load_feature_store(&features, TARGET).unwrap();
    assert_eq!(tables.len(), 4);
    assert!(tables[&Granularity::Hour].schema().index_of("note").is_none());

    let results = root.path().join("results");
    let snapshots = write_history(&results, &tables).unwrap();
    assert_eq!(snapshots.len(), 4);
    let monthly = fs::read_to_string(results.join("monthly_history.csv")).unwrap();
    assert_eq!(monthly.lines().count(), 2);

    let registry = ModelRegistry::load_dir(&models).unwrap();
    assert_eq!(registry.len(), 3);

    let engine = ForecastEngine::from_config(&ForecastConfig::default(), tables, &registry);
    assert_eq!(engine.jobs().len(), 3);

    let report = engine.forecast(at(2024, 1, 14, 12));
    assert!(report.records_for(Granularity::Hour).count() > 24);
    assert!(report.records_for(Granularity::Day).count() > 1);
    assert!(report.records_for(Granularity::Week).next().is_none());
    assert_eq!(report.records_for(Granularity::Month).count(), 1);

    let out = results.join("predictions.csv");
    write_predictions(&out, &report.records).unwrap();

    let mut reader = csv::Reader::from_path(&out).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["target", "prediction", "for", "feature_date", "granularity"]
    );
    let rows = reader.records().count();
    assert_eq!(rows, report.records.len());
}
