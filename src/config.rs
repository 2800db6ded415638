use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::Granularity;
use crate::forecast::{AnalogScope, EngineSettings, FeatureConventions, HorizonSettings};

pub const ENV_PREFIX: &str = "COSTCAST__";
pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Json }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub feature_dir: PathBuf,
    pub model_dir: PathBuf,
    pub output: PathBuf,
}
impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            feature_dir: PathBuf::from("features"),
            model_dir: PathBuf::from("models"),
            output: PathBuf::from("results/predictions.csv"),
        }
    }
}

/// Loop bounds for one granularity; unset caps use the built-in defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GranularityConfig {
    pub enabled: bool,
    pub max_iterations: Option<usize>,
    pub max_horizon_periods: Option<usize>,
}
impl Default for GranularityConfig {
    fn default() -> Self {
        Self { enabled: true, max_iterations: None, max_horizon_periods: None }
    }
}
impl GranularityConfig {
    pub fn horizon(&self, granularity: Granularity) -> HorizonSettings {
        let defaults = HorizonSettings::for_granularity(granularity);
        HorizonSettings {
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            max_horizon_periods: self.max_horizon_periods.unwrap_or(defaults.max_horizon_periods),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub target: String,
    pub lead_days: u32,
    #[serde(flatten)]
    pub conventions: FeatureConventions,
    pub analog_scope: AnalogScope,
    pub include_open_month: bool,
    /// Run granularities on the blocking pool concurrently
    pub parallel: bool,
    pub hour: GranularityConfig,
    pub day: GranularityConfig,
    pub week: GranularityConfig,
    pub month: GranularityConfig,
}
impl Default for ForecastConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            target: engine.target,
            lead_days: engine.lead_days,
            conventions: FeatureConventions::default(),
            analog_scope: engine.analog_scope,
            include_open_month: engine.include_open_month,
            parallel: true,
            hour: GranularityConfig::default(),
            day: GranularityConfig::default(),
            week: GranularityConfig::default(),
            month: GranularityConfig::default(),
        }
    }
}
impl ForecastConfig {
    pub fn granularity(&self, granularity: Granularity) -> &GranularityConfig {
        match granularity {
            Granularity::Hour => &self.hour,
            Granularity::Day => &self.day,
            Granularity::Week => &self.week,
            Granularity::Month => &self.month,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            target: self.target.clone(),
            lead_days: self.lead_days,
            analog_scope: self.analog_scope,
            include_open_month: self.include_open_month,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self> {
        Ok(Self::figment().extract()?)
    }

    pub fn validate(&self) -> Result<()> {
        let f = &self.forecast;
        ensure!(!f.target.trim().is_empty(), "forecast.target must not be empty");
        ensure!(!f.conventions.lag_marker.is_empty(), "forecast.lag_marker must not be empty");
        for granularity in Granularity::ALL {
            let h = f.granularity(granularity).horizon(granularity);
            ensure!(
                h.max_iterations > 0 && h.max_horizon_periods > 0,
                "forecast.{granularity}: caps must be positive"
            );
        }
        Ok(())
    }
}
