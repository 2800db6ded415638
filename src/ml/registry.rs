//! Model Registry
//!
//! One fitted model per granularity, each with the ordered feature names it
//! was trained on. Bundles live on disk as `{granularity}_model.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::{LinearRegressionModel, Regressor};
use crate::domain::Granularity;

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model bundle {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model bundle lists no features")]
    NoFeatures,

    #[error("model has {coefficients} coefficients for {features} features")]
    CoefficientMismatch { features: usize, coefficients: usize },

    #[cfg(feature = "ml")]
    #[error("failed to load random forest {path}: {message}")]
    Forest { path: PathBuf, message: String },
}

/// Serialized model family and parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    /// bincode-serialized smartcore random forest, relative to the bundle file
    #[cfg(feature = "ml")]
    RandomForest { path: PathBuf },
}

/// On-disk model bundle: the model plus its ordered training features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub features: Vec<String>,
    pub model: ModelSpec,
}

impl ModelBundle {
    pub fn from_path(path: &Path) -> Result<Self, ModelLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ModelLoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Instantiate the regressor. Relative paths inside the bundle resolve against `base_dir`.
    pub fn build(&self, base_dir: &Path) -> Result<Arc<dyn Regressor>, ModelLoadError> {
        if self.features.is_empty() {
            return Err(ModelLoadError::NoFeatures);
        }
        #[cfg(not(feature = "ml"))]
        let _ = base_dir;

        match &self.model {
            ModelSpec::Linear {
                coefficients,
                intercept,
            } => {
                if coefficients.len() != self.features.len() {
                    return Err(ModelLoadError::CoefficientMismatch {
                        features: self.features.len(),
                        coefficients: coefficients.len(),
                    });
                }
                Ok(Arc::new(LinearRegressionModel::new(
                    coefficients.clone(),
                    *intercept,
                )))
            }
            #[cfg(feature = "ml")]
            ModelSpec::RandomForest { path } => {
                let full = base_dir.join(path);
                let forest = super::smartcore::SmartcoreRandomForest::from_file(&full).map_err(
                    |e| ModelLoadError::Forest {
                        path: full.clone(),
                        message: format!("{e:#}"),
                    },
                )?;
                Ok(Arc::new(forest))
            }
        }
    }
}

/// A loaded model and the feature order it expects
#[derive(Clone)]
pub struct RegisteredModel {
    pub model: Arc<dyn Regressor>,
    pub features: Vec<String>,
}

/// Granularity → fitted model
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<Granularity, RegisteredModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any previous one for the granularity
    pub fn register(
        &mut self,
        granularity: Granularity,
        model: Arc<dyn Regressor>,
        features: Vec<String>,
    ) {
        self.models
            .insert(granularity, RegisteredModel { model, features });
    }

    pub fn get(&self, granularity: Granularity) -> Option<&RegisteredModel> {
        self.models.get(&granularity)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Load every `{granularity}_model.json` found in `dir`. Missing bundles are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, ModelLoadError> {
        let mut registry = Self::new();
        for granularity in Granularity::ALL {
            let path = dir.join(format!("{granularity}_model.json"));
            if !path.exists() {
                warn!(%granularity, path = %path.display(), "no model bundle, granularity disabled");
                continue;
            }
            let bundle = ModelBundle::from_path(&path)?;
            let model = bundle.build(dir)?;
            info!(
                %granularity,
                features = bundle.features.len(),
                path = %path.display(),
                "model bundle loaded"
            );
            registry.register(granularity, model, bundle.features);
        }
        Ok(registry)
    }
}
