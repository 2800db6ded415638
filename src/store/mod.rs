//! File-backed Feature Store and prediction export.
//!
//! One CSV per granularity under the feature directory; predictions go to a
//! single CSV for the presentation layer, with a history snapshot per
//! granularity beside it.

pub mod export;
pub mod tables;

pub use export::{history_file_name, write_history, write_predictions};
pub use tables::{load_feature_store, parse_timestamp, read_feature_table, TIMESTAMP_COLUMNS};

use std::path::PathBuf;
use thiserror::Error;

use crate::history::HistoryError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no timestamp column (expected one of {expected})")]
    MissingTimestampColumn { path: PathBuf, expected: String },

    #[error("{path}: {source}")]
    History {
        path: PathBuf,
        #[source]
        source: HistoryError,
    },
}
