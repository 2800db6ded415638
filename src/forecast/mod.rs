//! Recursive forecast synthesis.
//!
//! Leaf-first: [`analog`], [`lag`] and [`fallback`] read the working history,
//! [`synthesizer`] composes them (with [`guard`]) into one feature vector,
//! [`horizon`] drives the recursive loop for one granularity and [`engine`]
//! runs every granularity and merges the output.

pub mod analog;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod guard;
pub mod horizon;
pub mod lag;
pub mod plan;
pub mod synthesizer;

pub use analog::AnalogScope;
pub use engine::{
    horizon_end, run_job, EngineSettings, ForecastEngine, ForecastJob, ForecastReport,
    GranularityRun, RunStatus,
};
pub use error::ForecastError;
pub use horizon::{clamp_prediction, HorizonController, HorizonOutcome, HorizonSettings, StopReason};
pub use plan::{FeatureConventions, FeaturePlan, LagFeature};
pub use synthesizer::{FeatureSynthesizer, Synthesis, ValueSource};
