use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SweepError;
use crate::grid::GridPoint;

/// One record per attempted grid point. Success and failure are mutually
/// exclusive; `prompt_eval_rate` is serialized even when null so the document
/// stays readable by the downstream heatmap tooling, while `error` and
/// `timestamp` are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub num_ctx: u32,
    pub num_batch: u32,
    pub prompt_eval_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TrialOutcome {
    pub fn success(point: GridPoint, prompt_eval_rate: f64) -> Self {
        TrialOutcome {
            num_ctx: point.num_ctx,
            num_batch: point.num_batch,
            prompt_eval_rate: Some(prompt_eval_rate),
            error: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn failure(point: GridPoint, error: impl Into<String>) -> Self {
        TrialOutcome {
            num_ctx: point.num_ctx,
            num_batch: point.num_batch,
            prompt_eval_rate: None,
            error: Some(error.into()),
            timestamp: None,
        }
    }

    pub fn key(&self) -> (u32, u32) {
        (self.num_ctx, self.num_batch)
    }
}

/// Sweep-wide bookkeeping. Overwritten wholesale at sweep start and sweep
/// end; never consulted for resume decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_batch_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tests: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_seconds: Option<f64>,
}

/// The durable result document: `{ "metadata": {...}, "results": [...] }`.
/// Results are append-only; a re-run of a previously failed point appends a
/// new record rather than rewriting the old one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultCollection {
    #[serde(default)]
    pub metadata: SweepMetadata,
    #[serde(default)]
    pub results: Vec<TrialOutcome>,
}

impl ResultCollection {
    /// Keys with any recorded outcome, success or failure. Presence alone
    /// means "done" for the resume-skip check, so recorded failures are not
    /// retried on a later run.
    pub fn completed_keys(&self) -> BTreeSet<(u32, u32)> {
        self.results.iter().map(TrialOutcome::key).collect()
    }

    pub fn push(&mut self, outcome: TrialOutcome) {
        self.results.push(outcome);
    }
}

/// Owner of the durable store file. The whole document is rewritten on every
/// save so a crash can lose at most one trial's worth of work.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ResultStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is a fresh sweep; a present but unparseable file is
    /// fatal, since continuing would overwrite history.
    pub fn load(&self) -> Result<ResultCollection, SweepError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResultCollection::default());
            }
            Err(e) => return Err(SweepError::io(&self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| SweepError::CorruptStore {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomic overwrite: temp file in the same directory, fsync, rename.
    pub fn save(&self, collection: &ResultCollection) -> Result<(), SweepError> {
        let bytes = serde_json::to_vec_pretty(collection).map_err(|e| {
            SweepError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, e))?;
            }
        }
        let name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("results");
        let tmp = self
            .path
            .with_file_name(format!(".{}.tmp.{}", name, std::process::id()));
        let mut file = fs::File::create(&tmp).map_err(|e| SweepError::io(&tmp, e))?;
        file.write_all(&bytes).map_err(|e| SweepError::io(&tmp, e))?;
        file.sync_all().map_err(|e| SweepError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| SweepError::io(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(num_ctx: u32, num_batch: u32) -> GridPoint {
        GridPoint { num_ctx, num_batch }
    }

    #[test]
    fn load_missing_store_is_fresh_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("benchmark_results.json"));
        let collection = store.load().unwrap();
        assert_eq!(collection, ResultCollection::default());
        assert!(collection.completed_keys().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("benchmark_results.json"));
        let mut collection = ResultCollection::default();
        collection.push(TrialOutcome::success(point(8192, 32), 123.45));
        collection.push(TrialOutcome::failure(point(8192, 160), "Timeout"));
        store.save(&collection).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, collection);
        assert_eq!(loaded.results[1].prompt_eval_rate, None);
        assert_eq!(loaded.results[1].error.as_deref(), Some("Timeout"));
    }

    #[test]
    fn corrupt_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmark_results.json");
        fs::write(&path, b"{not json").unwrap();
        let store = ResultStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, SweepError::CorruptStore { .. }));
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("benchmark_results.json"));
        store.save(&ResultCollection::default()).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["benchmark_results.json"]);
    }

    #[test]
    fn completed_keys_counts_failures_as_done() {
        let mut collection = ResultCollection::default();
        collection.push(TrialOutcome::failure(point(8192, 32), "Failed to create model"));
        collection.push(TrialOutcome::success(point(10240, 32), 88.0));
        let keys = collection.completed_keys();
        assert!(keys.contains(&(8192, 32)));
        assert!(keys.contains(&(10240, 32)));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn failure_records_serialize_with_null_rate_and_no_timestamp() {
        let outcome = TrialOutcome::failure(point(8192, 32), "CUDA OOM");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["prompt_eval_rate"], serde_json::Value::Null);
        assert!(value.get("timestamp").is_none());

        let outcome = TrialOutcome::success(point(8192, 32), 101.5);
        let value = serde_json::to_value(&outcome).unwrap();
        assert!(value.get("error").is_none());
        assert!(value.get("timestamp").is_some());
    }
}
