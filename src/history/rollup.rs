//! Coarser tables from finer ones.
//!
//! Daily rows aggregate hourly rows by calendar date; weekly and monthly rows
//! aggregate daily rows. The target column is summed, every other column is
//! averaged over its finite values.

use itertools::Itertools;

use super::{FeatureTable, HistoryError, HistoryRow};
use crate::domain::Granularity;

pub fn rollup(
    source: &FeatureTable,
    to: Granularity,
    target: &str,
) -> Result<FeatureTable, HistoryError> {
    if to <= source.granularity() {
        return Err(HistoryError::InvalidRollup {
            from: source.granularity(),
            to,
        });
    }
    let target_col = source
        .schema()
        .index_of(target)
        .ok_or_else(|| HistoryError::MissingColumn(target.to_string()))?;
    let width = source.columns().len();

    let groups = source.rows().iter().chunk_by(|row| to.floor(row.timestamp));
    let mut rows = Vec::new();
    for (start, group) in &groups {
        let members: Vec<&HistoryRow> = group.collect();
        let values: Vec<f64> = (0..width)
            .map(|col| {
                let finite = members.iter().map(|r| r.value(col)).filter(|v| v.is_finite());
                if col == target_col {
                    finite.sum::<f64>()
                } else {
                    mean(finite).unwrap_or(f64::NAN)
                }
            })
            .collect();
        rows.push((start, values));
    }

    FeatureTable::new(to, source.columns().to_vec(), rows)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}
