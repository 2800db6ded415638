use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Granularity, Period};

/// One forecast output: what was predicted, for which period, and when that period starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub target: String,
    /// Predicted cost, never negative
    pub prediction: f64,
    #[serde(rename = "for")]
    pub label: String,
    #[serde(rename = "feature_date", with = "feature_date")]
    pub timestamp: NaiveDateTime,
    pub granularity: Granularity,
}

impl PredictionRecord {
    pub fn new(target: impl Into<String>, prediction: f64, period: &Period) -> Self {
        Self {
            target: target.into(),
            prediction,
            label: period.label(),
            timestamp: period.start,
            granularity: period.granularity,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// `feature_date` is written as `%Y-%m-%d %H:%M:%S`
mod feature_date {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
