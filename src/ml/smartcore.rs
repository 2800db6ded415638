//! SmartCore RandomForest adapter
//!
//! Loads a bincode-serialized smartcore `RandomForestRegressor` and exposes
//! it through the [`Regressor`] contract.

use super::{FeatureVector, Prediction, Regressor};
use anyhow::{Context, Result};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

pub struct SmartcoreRandomForest {
    model: Forest,
}

impl SmartcoreRandomForest {
    pub fn new(model: Forest) -> Self {
        Self { model }
    }

    /// Restore a forest written by [`SmartcoreRandomForest::save`]
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open random forest {}", path.display()))?;
        let model: Forest = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| anyhow::anyhow!("Failed to deserialize model: {}", e))?;
        Ok(Self { model })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("create random forest {}", path.display()))?;
        bincode::serialize_into(BufWriter::new(file), &self.model)
            .map_err(|e| anyhow::anyhow!("Failed to serialize model: {}", e))
    }
}

impl Regressor for SmartcoreRandomForest {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        // 1 row, n features
        let x = DenseMatrix::new(1, features.len(), features.features.clone(), false);

        let predictions = self
            .model
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))?;

        let value = predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Model returned empty predictions"))?;

        Ok(Prediction::new(value))
    }
}
