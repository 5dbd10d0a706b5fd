//! Run log and replay store
//!
//! Every completed pipeline run is appended to a JSON file so `replay` can
//! resume from a recorded task. Records carry a hash of their inputs for
//! integrity verification.

use crate::error::CrewError;
use crate::models::{PipelineInputs, RunRecord};
use crate::Result;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_RUN_LOG: &str = "outputs/run_log.json";

pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Self {
        Self::new(DEFAULT_RUN_LOG)
    }

    /// Append one record, rewriting the log file.
    pub async fn append(&self, record: &RunRecord) -> Result<()> {
        let mut records = self.load_all().await?;
        records.push(record.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let serialized = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(&self.path, serialized).await?;
        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<RunRecord>> {
        if !Path::new(&self.path).exists() {
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&raw).map_err(|e| {
            CrewError::RunLogError(format!(
                "cannot parse run log {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// The most recently appended run, if any.
    pub async fn latest(&self) -> Result<Option<RunRecord>> {
        Ok(self.load_all().await?.into_iter().last())
    }
}

/// Compute SHA256 over the canonical JSON of the pipeline inputs.
/// Streams serialization directly into the hasher.
pub fn compute_input_hash(inputs: &PipelineInputs) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), inputs).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Recompute a record's input hash and compare.
pub fn verify_integrity(record: &RunRecord) -> bool {
    compute_input_hash(&record.inputs) == record.input_hash
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskRecord;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_record() -> RunRecord {
        let inputs = PipelineInputs::new()
            .with("amount_received", "1000")
            .with("currency", "USD");
        RunRecord {
            run_id: Uuid::new_v4(),
            input_hash: compute_input_hash(&inputs),
            inputs,
            tasks: vec![TaskRecord {
                task_id: "currency_audit_task".to_string(),
                agent: "financial_analyst".to_string(),
                output: "rate summary".to_string(),
                execution_time_ms: 42,
                completed_at: Utc::now(),
            }],
            final_output: "rate summary".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_latest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("run_log.json"));

        assert!(log.latest().await.unwrap().is_none());

        let first = sample_record();
        let second = sample_record();
        log.append(&first).await.unwrap();
        log.append(&second).await.unwrap();

        let all = log.load_all().await.unwrap();
        assert_eq!(all.len(), 2);

        let latest = log.latest().await.unwrap().unwrap();
        assert_eq!(latest.run_id, second.run_id);
        assert_eq!(latest.tasks[0].output, "rate summary");
    }

    #[test]
    fn test_input_hash_is_stable_and_discriminating() {
        let a = PipelineInputs::new().with("amount_received", "1000");
        let b = PipelineInputs::new().with("amount_received", "1000");
        let c = PipelineInputs::new().with("amount_received", "250");

        assert_eq!(compute_input_hash(&a), compute_input_hash(&b));
        assert_ne!(compute_input_hash(&a), compute_input_hash(&c));
    }

    #[test]
    fn test_verify_integrity_detects_tampering() {
        let mut record = sample_record();
        assert!(verify_integrity(&record));

        record.inputs.values.insert("amount_received".to_string(), "9999".to_string());
        assert!(!verify_integrity(&record));
    }
}
