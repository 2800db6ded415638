//! ML Model Definitions
//!
//! The regressor contract plus the model families the registry can load.

use super::{FeatureVector, Prediction};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A fitted regression model: one feature vector in, one scalar out
#[cfg_attr(test, mockall::automock)]
pub trait Regressor: Send + Sync {
    /// Predict a value from features
    fn predict(&self, features: &FeatureVector) -> Result<Prediction>;
}

/// Adapter that turns a closure into a [`Regressor`]
pub struct FnRegressor<F>(F);

impl<F> FnRegressor<F>
where
    F: Fn(&FeatureVector) -> Result<f64> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Regressor for FnRegressor<F>
where
    F: Fn(&FeatureVector) -> Result<f64> + Send + Sync,
{
    fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        (self.0)(features).map(Prediction::new)
    }
}

/// Simple Linear Regression Model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressionModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl Regressor for LinearRegressionModel {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        if features.len() != self.coefficients.len() {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                self.coefficients.len(),
                features.len()
            );
        }

        let prediction: f64 = features
            .features
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.intercept;

        Ok(Prediction::new(prediction))
    }
}
