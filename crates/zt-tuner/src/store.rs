//! On-disk trial persistence: JSON snapshot, CSV table and timing log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use zt_search::TrialLog;
use zt_types::{ParameterValue, ZtError, ZtResult};

/// Serialized form of a [`TrialLog`]: row-aligned columns plus the flags
/// telling recorded scores from placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSnapshot {
    pub names: Vec<String>,
    pub normalized: Vec<Vec<f64>>,
    pub rescaled: Vec<Vec<ParameterValue>>,
    pub scores: Vec<f64>,
    pub scored: Vec<bool>,
    pub saved_at: DateTime<Utc>,
}

impl TrialSnapshot {
    pub fn from_log(log: &TrialLog) -> Self {
        Self {
            names: log.names().to_vec(),
            normalized: log.unscaled_params().to_vec(),
            rescaled: log.actual_params().to_vec(),
            scores: log.scores().to_vec(),
            scored: log.scored_flags().to_vec(),
            saved_at: Utc::now(),
        }
    }

    pub fn into_log(self) -> ZtResult<TrialLog> {
        TrialLog::from_parts(
            self.names,
            self.rescaled,
            self.normalized,
            self.scores,
            self.scored,
        )
    }
}

/// File-backed persistence for one tuner's trials
#[derive(Debug, Clone)]
pub struct TrialStore {
    root: PathBuf,
    name: String,
}

impl TrialStore {
    pub fn new<P: AsRef<Path>>(root: P, name: impl Into<String>) -> ZtResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            name: name.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(format!("{}_trials.json", self.name))
    }

    pub fn csv_path(&self) -> PathBuf {
        self.root.join(format!("{}_params_score.csv", self.name))
    }

    pub fn time_log_path(&self) -> PathBuf {
        self.root.join("time_log.txt")
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot_path().exists()
    }

    /// Write the JSON snapshot and the CSV table.
    pub fn save(&self, log: &TrialLog) -> ZtResult<()> {
        let snapshot = TrialSnapshot::from_log(log);
        fs::write(self.snapshot_path(), serde_json::to_vec_pretty(&snapshot)?)?;
        self.write_csv(log)?;

        debug!(trials = log.len(), path = %self.snapshot_path().display(), "saved trial log");
        Ok(())
    }

    /// Read the JSON snapshot back into a log.
    pub fn load(&self) -> ZtResult<TrialLog> {
        let bytes = fs::read(self.snapshot_path())?;
        let snapshot: TrialSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.into_log()
    }

    /// Append a timestamp line for trial `param_id`.
    pub fn record_time(&self, param_id: usize) -> ZtResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.time_log_path())?;
        writeln!(file, "Param id {}: {}", param_id, Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn write_csv(&self, log: &TrialLog) -> ZtResult<()> {
        let csv_error = |e: csv::Error| ZtError::Csv(e.to_string());
        let mut writer = csv::Writer::from_path(self.csv_path()).map_err(csv_error)?;

        let mut header: Vec<&str> = log.names().iter().map(String::as_str).collect();
        header.push("Score");
        writer.write_record(&header).map_err(csv_error)?;

        for (values, score) in log.actual_params().iter().zip(log.scores()) {
            let mut record: Vec<String> = values.iter().map(format_cell).collect();
            record.push(format!("{score:.5}"));
            writer.write_record(&record).map_err(csv_error)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Numbers in 5-decimal fixed format, other candidates as text.
fn format_cell(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Json(serde_json::Value::String(s)) => s.clone(),
        other => match other.as_f64() {
            Some(v) => format!("{v:.5}"),
            None => other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use zt_search::{RescalerSet, SearchStrategy, TrialId, UniformSearch};
    use zt_types::SearchSpace;

    fn sample_log() -> TrialLog {
        let mut log = TrialLog::new(vec!["lr".to_string(), "units".to_string(), "opt".to_string()]);
        let rows: [(Vec<ParameterValue>, Vec<f64>, f64); 2] = [
            (vec![0.001.into(), 64i64.into(), "adam".into()], vec![0.1, 0.2, 0.3], 0.5),
            (vec![0.0123456.into(), 128i64.into(), "sgd".into()], vec![0.4, 0.5, 0.6], 0.75),
        ];
        for (actual, unscaled, score) in rows {
            let id = log.log_param(actual, unscaled, 0.0).unwrap().unwrap();
            log.log_score(score, Some(id)).unwrap();
        }
        log
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let store = TrialStore::new(temp_dir.path().join("nested"), "demo").unwrap();
        assert!(!store.has_snapshot());

        let log = sample_log();
        store.save(&log).unwrap();
        assert!(store.has_snapshot());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.names(), log.names());
        assert_eq!(loaded.actual_params(), log.actual_params());
        assert_eq!(loaded.unscaled_params(), log.unscaled_params());
        assert_eq!(loaded.scores(), log.scores());
    }

    #[test]
    fn test_snapshot_is_bit_exact() {
        let space = SearchSpace::new()
            .add_double("x", 0.0, 1.0)
            .add_double("lr", 0.0001, 0.1)
            .add_integer("units", 1, 1000);
        let rescalers = Arc::new(RescalerSet::from_space(&space).unwrap());
        let mut log = TrialLog::new(rescalers.names().to_vec());
        let mut search = UniformSearch::new(rescalers).with_seed(99);
        for _ in 0..1000 {
            let s = search.suggest(&mut log).unwrap();
            let score = -(s.unit[0] - 0.3).powi(2) / 3.0 + (s.unit[1] + 1.0).ln();
            log.log_score(score, Some(s.trial)).unwrap();
        }

        let temp_dir = tempdir().unwrap();
        let store = TrialStore::new(temp_dir.path(), "exact").unwrap();
        store.save(&log).unwrap();
        let mut loaded = store.load().unwrap();

        let bits = |rows: &[Vec<f64>]| -> Vec<Vec<u64>> {
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_bits()).collect())
                .collect()
        };
        assert_eq!(bits(loaded.unscaled_params()), bits(log.unscaled_params()));
        let score_bits = |scores: &[f64]| -> Vec<u64> { scores.iter().map(|v| v.to_bits()).collect() };
        assert_eq!(score_bits(loaded.scores()), score_bits(log.scores()));

        // Every reloaded sample is still known to the duplicate check.
        for (actual, unscaled) in log.actual_params().iter().zip(log.unscaled_params()) {
            assert!(loaded
                .log_param(actual.clone(), unscaled.clone(), 0.0)
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn test_unscored_rows_survive_reload() {
        let mut log = sample_log();
        let id = log
            .log_param(vec![0.5.into(), 32i64.into(), "adam".into()], vec![0.7, 0.8, 0.9], 0.0)
            .unwrap()
            .unwrap();

        let temp_dir = tempdir().unwrap();
        let store = TrialStore::new(temp_dir.path(), "partial").unwrap();
        store.save(&log).unwrap();
        let mut loaded = store.load().unwrap();

        assert!(loaded.is_scored(TrialId(0)));
        assert!(loaded.is_scored(TrialId(1)));
        assert!(!loaded.is_scored(id));
        assert_eq!(loaded.best(), Some(TrialId(1)));
        loaded.log_score(0.9, Some(id)).unwrap();
        assert_eq!(loaded.best(), Some(id));
    }

    #[test]
    fn test_csv_export_format() {
        let temp_dir = tempdir().unwrap();
        let store = TrialStore::new(temp_dir.path(), "demo").unwrap();
        store.save(&sample_log()).unwrap();

        let text = fs::read_to_string(store.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "lr,units,opt,Score");
        assert_eq!(lines[1], "0.00100,64.00000,adam,0.50000");
        assert_eq!(lines[2], "0.01235,128.00000,sgd,0.75000");
    }

    #[test]
    fn test_time_log_appends() {
        let temp_dir = tempdir().unwrap();
        let store = TrialStore::new(temp_dir.path(), "demo").unwrap();
        store.record_time(1).unwrap();
        store.record_time(2).unwrap();

        let text = fs::read_to_string(store.time_log_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Param id 1: "));
        assert!(lines[1].starts_with("Param id 2: "));
    }

    #[test]
    fn test_load_missing_snapshot_fails() {
        let temp_dir = tempdir().unwrap();
        let store = TrialStore::new(temp_dir.path(), "missing").unwrap();
        assert!(matches!(store.load(), Err(ZtError::Io(_))));
    }
}
