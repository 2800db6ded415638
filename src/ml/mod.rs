//! Machine Learning Module
//!
//! The forecasting core only needs a fitted regressor per granularity and the
//! ordered feature names it was trained on:
//! - [`FeatureVector`]: ordered, named input slots
//! - [`Regressor`]: the `predict(features) -> scalar` contract
//! - [`registry`]: model bundles loaded from disk

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod models;
pub mod registry;

#[cfg(feature = "ml")]
pub mod smartcore;

pub use models::{FnRegressor, LinearRegressionModel, Regressor};
#[cfg(test)]
pub use models::MockRegressor;
pub use registry::{ModelBundle, ModelLoadError, ModelRegistry, ModelSpec, RegisteredModel};

/// Feature Vector for ML models, in the order the model expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, feature_names: Vec<String>) -> Result<Self> {
        if features.len() != feature_names.len() {
            anyhow::bail!(
                "Feature count mismatch: {} features, {} names",
                features.len(),
                feature_names.len()
            );
        }
        Ok(Self {
            features,
            feature_names,
        })
    }

    /// Build from `(name, value)` pairs, keeping their order
    pub fn from_named<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (feature_names, features) = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .unzip();
        Self {
            features,
            feature_names,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Value of a named slot
    pub fn get(&self, name: &str) -> Option<f64> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.features[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.feature_names
            .iter()
            .map(String::as_str)
            .zip(self.features.iter().copied())
    }

    /// True when every slot holds a finite value
    pub fn is_complete(&self) -> bool {
        self.features.iter().all(|v| v.is_finite())
    }
}

/// ML Prediction Result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
}

impl Prediction {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}
