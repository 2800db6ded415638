use chrono::NaiveDateTime;
use std::sync::Arc;

use super::{FeatureTable, HistoryError, HistoryRow, RowOrigin, Schema};
use crate::domain::Granularity;

/// Run-scoped history: the Feature Store rows plus every row synthesized so
/// far in the current run.
///
/// Rows are kept in an append-only arena sorted by timestamp, so "as of T"
/// lookups are binary searches. Observed rows always precede synthesized ones.
#[derive(Debug, Clone)]
pub struct WorkingHistory {
    granularity: Granularity,
    schema: Arc<Schema>,
    rows: Vec<HistoryRow>,
    observed: usize,
}

impl WorkingHistory {
    pub fn from_table(table: &FeatureTable) -> Self {
        let rows = table.rows().to_vec();
        Self {
            granularity: table.granularity(),
            schema: Arc::clone(table.schema()),
            observed: rows.len(),
            rows,
        }
    }

    /// Like [`WorkingHistory::from_table`] but drops rows at or after `end`
    pub fn from_table_until(table: &FeatureTable, end: NaiveDateTime) -> Self {
        let cut = table.rows().partition_point(|r| r.timestamp < end);
        let rows = table.rows()[..cut].to_vec();
        Self {
            granularity: table.granularity(),
            schema: Arc::clone(table.schema()),
            observed: rows.len(),
            rows,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    /// Rows that came from the Feature Store
    pub fn observed_rows(&self) -> &[HistoryRow] {
        &self.rows[..self.observed]
    }

    pub fn synthesized_count(&self) -> usize {
        self.rows.len() - self.observed
    }

    pub fn last(&self) -> Option<&HistoryRow> {
        self.rows.last()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|r| r.timestamp)
    }

    /// Rows with a timestamp strictly before `ts`
    pub fn rows_before(&self, ts: NaiveDateTime) -> &[HistoryRow] {
        let cut = self.rows.partition_point(|r| r.timestamp < ts);
        &self.rows[..cut]
    }

    /// The most recent row at or before `ts`
    pub fn latest_at_or_before(&self, ts: NaiveDateTime) -> Option<&HistoryRow> {
        let cut = self.rows.partition_point(|r| r.timestamp <= ts);
        cut.checked_sub(1).map(|i| &self.rows[i])
    }

    /// Append a synthesized row. It must be strictly later than every existing row.
    pub fn push_synthesized(
        &mut self,
        timestamp: NaiveDateTime,
        values: Vec<f64>,
    ) -> Result<(), HistoryError> {
        if values.len() != self.schema.len() {
            return Err(HistoryError::RowWidth {
                timestamp,
                expected: self.schema.len(),
                actual: values.len(),
            });
        }
        if let Some(last) = self.last_timestamp() {
            if timestamp <= last {
                return Err(HistoryError::NonMonotonicAppend {
                    attempted: timestamp,
                    last,
                });
            }
        }
        self.rows.push(HistoryRow {
            timestamp,
            values,
            origin: RowOrigin::Synthesized,
        });
        Ok(())
    }
}
