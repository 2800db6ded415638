use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;
use energy_cost_forecaster::{config, forecast, ml, store, telemetry};
use config::Config;
use forecast::ForecastEngine;
use ml::ModelRegistry;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::load().context("loading configuration")?;
    init_tracing(&cfg.logging)?;
    cfg.validate()?;

    let tables = store::load_feature_store(&cfg.paths.feature_dir, &cfg.forecast.target)
        .context("loading feature store")?;
    let registry = ModelRegistry::load_dir(&cfg.paths.model_dir).context("loading models")?;

    let results_dir = cfg.paths.output.parent().unwrap_or_else(|| Path::new("."));
    store::write_history(results_dir, &tables).context("writing history snapshots")?;

    let engine = ForecastEngine::from_config(&cfg.forecast, tables, &registry);
    if engine.jobs().is_empty() {
        warn!("no granularity has both a feature table and a model, nothing to forecast");
    }

    let as_of = Local::now().naive_local();
    info!(%as_of, granularities = engine.jobs().len(), "starting forecast run");

    let report = if cfg.forecast.parallel {
        engine.forecast_concurrent(as_of).await
    } else {
        engine.forecast(as_of)
    };

    store::write_predictions(&cfg.paths.output, &report.records)
        .context("writing predictions")?;

    for run in &report.runs {
        info!(
            granularity = %run.granularity,
            status = ?run.status,
            records = run.records.len(),
            "granularity summary"
        );
    }
    info!(
        records = report.records.len(),
        fallback = report.fallback_used,
        output = %cfg.paths.output.display(),
        "forecast run complete"
    );
    Ok(())
}
