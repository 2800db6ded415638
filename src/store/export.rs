use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::StoreError;
use crate::domain::{Granularity, PredictionRecord};
use crate::history::FeatureTable;

/// Write records as `target,prediction,for,feature_date,granularity`,
/// creating the parent directory if needed
pub fn write_predictions(path: &Path, records: &[PredictionRecord]) -> Result<(), StoreError> {
    create_parent(path)?;

    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), records = records.len(), "predictions written");
    Ok(())
}

/// File name of the history snapshot for a granularity
pub fn history_file_name(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Hour => "hourly_history.csv",
        Granularity::Day => "daily_history.csv",
        Granularity::Week => "weekly_history.csv",
        Granularity::Month => "monthly_history.csv",
    }
}

/// Write every table as `<dir>/<granularity>_history.csv` so the dashboard can
/// plot observed history next to the predictions. Missing values are empty cells.
pub fn write_history(
    dir: &Path,
    tables: &HashMap<Granularity, FeatureTable>,
) -> Result<Vec<PathBuf>, StoreError> {
    let mut written = Vec::with_capacity(tables.len());
    for granularity in Granularity::ALL {
        let Some(table) = tables.get(&granularity) else {
            continue;
        };
        let path = dir.join(history_file_name(granularity));
        write_table(&path, table)?;
        info!(%granularity, path = %path.display(), rows = table.len(), "history written");
        written.push(path);
    }
    Ok(written)
}

fn write_table(path: &Path, table: &FeatureTable) -> Result<(), StoreError> {
    create_parent(path)?;

    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record(std::iter::once("timestamp").chain(table.columns().iter().map(String::as_str)))
        .map_err(csv_err)?;
    for row in table.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
        record.extend(row.values.iter().map(|v| {
            if v.is_finite() {
                v.to_string()
            } else {
                String::new()
            }
        }));
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Granularity, Period};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results").join("predictions.csv");
        let start = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        let records = vec![
            PredictionRecord::new("cost", 0.25, &Period::containing(Granularity::Hour, start)),
            PredictionRecord::new("cost", 4.0, &Period::containing(Granularity::Month, start))
                .with_label("next_month"),
        ];

        write_predictions(&path, &records).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "target,prediction,for,feature_date,granularity");
        assert_eq!(lines[1], "cost,0.25,hour_2025-01-02 03:00,2025-01-02 03:00:00,hour");
        assert_eq!(lines[2], "cost,4.0,next_month,2025-01-01 00:00:00,month");
    }

    #[test]
    fn test_history_tables_written_per_granularity() {
        let dir = tempdir().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let daily = FeatureTable::new(
            Granularity::Day,
            vec!["cost".to_string(), "temp".to_string()],
            vec![(day, vec![1.5, f64::NAN])],
        )
        .unwrap();
        let tables = HashMap::from([(Granularity::Day, daily)]);

        let written = write_history(dir.path(), &tables).unwrap();
        assert_eq!(written, vec![dir.path().join("daily_history.csv")]);

        let text = fs::read_to_string(&written[0]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["timestamp,cost,temp", "2024-03-01 00:00:00,1.5,"]);
        assert!(!dir.path().join("hourly_history.csv").exists());
    }
}
