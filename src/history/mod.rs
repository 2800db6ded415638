//! Historical feature tables and the run-scoped working history.
//!
//! A [`FeatureTable`] is the immutable snapshot handed over by the Feature
//! Store for one granularity. A [`WorkingHistory`] starts as a copy of that
//! snapshot and grows by one synthesized row per forecast step.

pub mod rollup;
pub mod working;

pub use rollup::rollup;
pub use working::WorkingHistory;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::Granularity;

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("row at {timestamp} has {actual} values, expected {expected}")]
    RowWidth {
        timestamp: NaiveDateTime,
        expected: usize,
        actual: usize,
    },

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("cannot append row at {attempted}: history already ends at {last}")]
    NonMonotonicAppend {
        attempted: NaiveDateTime,
        last: NaiveDateTime,
    },

    #[error("cannot roll {from} rows up into {to} rows")]
    InvalidRollup { from: Granularity, to: Granularity },
}

/// Ordered column names with a name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> Result<Self, HistoryError> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(HistoryError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Whether a row came from the Feature Store or from this engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOrigin {
    Observed,
    Synthesized,
}

/// A timestamped set of column values; NaN marks a missing value
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<f64>,
    pub origin: RowOrigin,
}

impl HistoryRow {
    pub fn value(&self, column: usize) -> f64 {
        self.values.get(column).copied().unwrap_or(f64::NAN)
    }
}

/// Immutable per-granularity snapshot of the Feature Store
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    granularity: Granularity,
    schema: Arc<Schema>,
    rows: Vec<HistoryRow>,
}

impl FeatureTable {
    /// Build a table from unordered rows. Rows are sorted by timestamp and a
    /// repeated timestamp keeps its last occurrence.
    pub fn new(
        granularity: Granularity,
        columns: Vec<String>,
        rows: Vec<(NaiveDateTime, Vec<f64>)>,
    ) -> Result<Self, HistoryError> {
        let schema = Schema::new(columns)?;
        let width = schema.len();

        let mut indexed = Vec::with_capacity(rows.len());
        for (position, (timestamp, values)) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(HistoryError::RowWidth {
                    timestamp,
                    expected: width,
                    actual: values.len(),
                });
            }
            indexed.push((position, timestamp, values));
        }
        indexed.sort_by_key(|(position, timestamp, _)| (*timestamp, *position));

        let mut sorted: Vec<HistoryRow> = Vec::with_capacity(indexed.len());
        for (_, timestamp, values) in indexed {
            let row = HistoryRow {
                timestamp,
                values,
                origin: RowOrigin::Observed,
            };
            match sorted.last_mut() {
                Some(last) if last.timestamp == timestamp => *last = row,
                _ => sorted.push(row),
            }
        }

        Ok(Self {
            granularity,
            schema: Arc::new(schema),
            rows: sorted,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|r| r.timestamp)
    }

    /// Value of a named column in row `row`, if both exist
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.schema.index_of(column)?;
        self.rows.get(row).map(|r| r.value(col))
    }
}
