use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::StoreError;
use crate::domain::Granularity;
use crate::history::{rollup, FeatureTable};

/// Candidate timestamp headers, in order of preference
pub const TIMESTAMP_COLUMNS: [&str; 4] = ["timestamp", "date", "week_start", "year_month_start"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse the timestamp spellings found in the feature tables
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_cell(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Read one granularity's feature table.
///
/// Timestamps are floored to the granularity. Cells that do not parse as
/// numbers are missing (NaN); columns without a single numeric cell are dropped.
pub fn read_feature_table(path: &Path, granularity: Granularity) -> Result<FeatureTable, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let ts_col = TIMESTAMP_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        .ok_or_else(|| StoreError::MissingTimestampColumn {
            path: path.to_path_buf(),
            expected: TIMESTAMP_COLUMNS.join(", "),
        })?;
    let value_cols: Vec<usize> = (0..headers.len()).filter(|i| *i != ts_col).collect();

    let mut numeric = vec![false; value_cols.len()];
    let mut parsed: Vec<(NaiveDateTime, Vec<f64>)> = Vec::new();
    let mut skipped = 0usize;
    let mut record = StringRecord::new();
    while reader.read_record(&mut record).map_err(csv_err)? {
        let Some(ts) = record.get(ts_col).and_then(parse_timestamp) else {
            skipped += 1;
            continue;
        };
        let values = value_cols
            .iter()
            .zip(numeric.iter_mut())
            .map(|(col, seen)| match record.get(*col).and_then(parse_cell) {
                Some(v) => {
                    *seen = true;
                    v
                }
                None => f64::NAN,
            })
            .collect();
        parsed.push((granularity.floor(ts), values));
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped, "rows with unparseable timestamps skipped");
    }

    let keep: Vec<usize> = (0..value_cols.len()).filter(|i| numeric[*i]).collect();
    let dropped: Vec<&str> = (0..value_cols.len())
        .filter(|i| !numeric[*i])
        .filter_map(|i| headers.get(value_cols[i]))
        .collect();
    if !dropped.is_empty() {
        debug!(path = %path.display(), columns = ?dropped, "non-numeric columns dropped");
    }

    let columns = keep
        .iter()
        .filter_map(|i| headers.get(value_cols[*i]).map(str::to_string))
        .collect();
    let rows = parsed
        .into_iter()
        .map(|(ts, values)| (ts, keep.iter().map(|i| values[*i]).collect()))
        .collect();

    FeatureTable::new(granularity, columns, rows).map_err(|source| StoreError::History {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `{dir}/{granularity}.csv` for every granularity. Missing daily,
/// weekly or monthly tables are rolled up from the next finer one
/// (hour → day → week / month).
pub fn load_feature_store(
    dir: &Path,
    target: &str,
) -> Result<HashMap<Granularity, FeatureTable>, StoreError> {
    let mut tables = HashMap::new();
    for granularity in Granularity::ALL {
        let path = dir.join(format!("{granularity}.csv"));
        if path.exists() {
            let table = read_feature_table(&path, granularity)?;
            info!(
                %granularity,
                rows = table.len(),
                columns = table.columns().len(),
                path = %path.display(),
                "feature table loaded"
            );
            tables.insert(granularity, table);
        }
    }

    for (to, from) in [
        (Granularity::Day, Granularity::Hour),
        (Granularity::Week, Granularity::Day),
        (Granularity::Month, Granularity::Day),
    ] {
        if tables.contains_key(&to) {
            continue;
        }
        let Some(source) = tables.get(&from) else {
            warn!(granularity = %to, "no feature table and nothing to derive it from");
            continue;
        };
        let derived = rollup(source, to, target).map_err(|source| StoreError::History {
            path: dir.join(format!("{to}.csv")),
            source,
        })?;
        info!(granularity = %to, from = %from, rows = derived.len(), "feature table derived by rollup");
        tables.insert(to, derived);
    }
    Ok(tables)
}
