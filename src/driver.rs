//! Pipeline driver
//!
//! The named operations behind the CLI. Each assembles fresh inputs,
//! invokes the pipeline, and wraps any failure once with a message naming
//! the operation.

use crate::config::{CrewConfig, RuntimeConfig};
use crate::error::CrewError;
use crate::models::{EvalScore, PipelineInputs, RunRecord};
use crate::ollama::OllamaClient;
use crate::pipeline::Pipeline;
use crate::runlog::RunLog;
use crate::tools::create_default_registry;
use crate::training;
use crate::Result;
use chrono::{Datelike, Local};
use serde_json::Value;
use tracing::info;

pub struct Driver {
    config: RuntimeConfig,
    run_log: RunLog,
}

impl Driver {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            run_log: RunLog::default_path(),
        }
    }

    pub fn with_run_log(config: RuntimeConfig, run_log: RunLog) -> Self {
        Self { config, run_log }
    }

    fn assemble(&self) -> Result<Pipeline> {
        let crew = CrewConfig::load(&self.config.agents_path, &self.config.tasks_path)?;
        Pipeline::assemble(&self.config, crew, create_default_registry())
    }

    /// Execute the pipeline once with the standard inputs.
    pub async fn run(&self) -> Result<RunRecord> {
        self.run_inner().await.map_err(|e| {
            CrewError::PipelineError(format!("An error occurred while running the crew: {}", e))
        })
    }

    async fn run_inner(&self) -> Result<RunRecord> {
        let inputs = PipelineInputs::new()
            .with("amount_received", self.config.amount.clone())
            .with("currency", "USD")
            .with(
                "current_date",
                Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            );

        let pipeline = self.assemble()?;
        let record = pipeline.kickoff(&inputs).await?;
        self.run_log.append(&record).await?;
        Ok(record)
    }

    /// Run the training loop for `n_iterations` against `filename`.
    pub async fn train(&self, n_iterations: u32, filename: &str) -> Result<()> {
        let result = async {
            let pipeline = self.assemble()?;
            training::train(&pipeline, &dummy_inputs(), n_iterations, filename).await
        }
        .await;

        result.map_err(|e| {
            CrewError::PipelineError(format!("An error occurred while training the crew: {}", e))
        })
    }

    /// Resume the most recent recorded run from `task_id`.
    pub async fn replay(&self, task_id: &str) -> Result<RunRecord> {
        let result = async {
            let prior = self.run_log.latest().await?.ok_or_else(|| {
                CrewError::ReplayError("no recorded runs to replay from".to_string())
            })?;

            info!(run_id = %prior.run_id, task_id, "Replaying from recorded run");

            let pipeline = self.assemble()?;
            let record = pipeline.kickoff_from(task_id, &prior).await?;
            self.run_log.append(&record).await?;
            Ok(record)
        }
        .await;

        result.map_err(|e: CrewError| {
            CrewError::PipelineError(format!("An error occurred while replaying the crew: {}", e))
        })
    }

    /// Run the evaluation loop for `n_iterations`, scored by `eval_judge`.
    pub async fn test(&self, n_iterations: u32, eval_judge: &str) -> Result<Vec<EvalScore>> {
        let result = async {
            let pipeline = self.assemble()?;
            let judge = OllamaClient::new(&self.config.base_url, eval_judge);
            training::evaluate(&pipeline, &judge, &dummy_inputs(), n_iterations).await
        }
        .await;

        result.map_err(|e| {
            CrewError::PipelineError(format!("An error occurred while testing the crew: {}", e))
        })
    }

    /// Execute the pipeline once with inputs derived from an external
    /// trigger payload, and return the run to the caller.
    ///
    /// Malformed JSON fails here, before any pipeline assembly, with an
    /// error distinct from execution failures.
    pub async fn run_with_trigger(&self, payload: &str) -> Result<RunRecord> {
        let payload: Value = serde_json::from_str(payload).map_err(|_| {
            CrewError::TriggerPayloadError(
                "Invalid JSON payload provided as argument".to_string(),
            )
        })?;

        let inputs = trigger_inputs(&payload);

        let result = async {
            let pipeline = self.assemble()?;
            let record = pipeline.kickoff(&inputs).await?;
            self.run_log.append(&record).await?;
            Ok(record)
        }
        .await;

        result.map_err(|e: CrewError| {
            CrewError::PipelineError(format!(
                "An error occurred while running the crew with trigger: {}",
                e
            ))
        })
    }
}

/// Fixed inputs for the train/test loops.
fn dummy_inputs() -> PipelineInputs {
    PipelineInputs::new()
        .with("amount_received", "1000")
        .with("currency", "USD")
        .with("current_year", Local::now().year().to_string())
}

/// Derive pipeline inputs from a trigger payload. The amount defaults to
/// "0" when the payload carries none.
fn trigger_inputs(payload: &Value) -> PipelineInputs {
    let amount = match payload.get("amount") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0".to_string(),
    };

    PipelineInputs::new()
        .with("amount_received", amount)
        .with("currency", "USD")
        .with("current_year", Local::now().year().to_string())
        .with_trigger_payload(payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trigger_inputs_take_amount_from_payload() {
        let inputs = trigger_inputs(&json!({"amount": "250"}));
        assert_eq!(inputs.get("amount_received"), Some("250"));
        assert_eq!(inputs.get("currency"), Some("USD"));
        assert_eq!(inputs.trigger_payload, Some(json!({"amount": "250"})));
    }

    #[test]
    fn test_trigger_inputs_default_amount_to_zero() {
        let inputs = trigger_inputs(&json!({}));
        assert_eq!(inputs.get("amount_received"), Some("0"));
    }

    #[test]
    fn test_trigger_inputs_accept_numeric_amount() {
        let inputs = trigger_inputs(&json!({"amount": 250}));
        assert_eq!(inputs.get("amount_received"), Some("250"));
    }

    #[test]
    fn test_dummy_inputs_shape() {
        let inputs = dummy_inputs();
        assert_eq!(inputs.get("amount_received"), Some("1000"));
        assert_eq!(inputs.get("currency"), Some("USD"));
        assert!(inputs.get("current_year").is_some());
        assert!(inputs.get("current_date").is_none());
    }

    #[tokio::test]
    async fn test_malformed_trigger_fails_before_assembly() {
        // Config points at nonexistent files: if the payload check did not
        // come first, the failure would be a wrapped assembly error.
        let config = RuntimeConfig {
            model: "test-model".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            amount: "0".to_string(),
            agents_path: "does/not/exist.yaml".into(),
            tasks_path: "does/not/exist.yaml".into(),
        };
        let driver = Driver::new(config);

        let err = driver.run_with_trigger("not valid json {").await.unwrap_err();
        assert!(matches!(err, CrewError::TriggerPayloadError(_)));
        assert!(err.to_string().contains("Invalid trigger payload"));
    }

    #[tokio::test]
    async fn test_pipeline_failure_message_is_distinct_from_trigger_failure() {
        let config = RuntimeConfig {
            model: "test-model".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            amount: "0".to_string(),
            agents_path: "does/not/exist.yaml".into(),
            tasks_path: "does/not/exist.yaml".into(),
        };
        let driver = Driver::new(config);

        let err = driver.run_with_trigger("{\"amount\": \"250\"}").await.unwrap_err();
        assert!(matches!(err, CrewError::PipelineError(_)));
        assert!(err
            .to_string()
            .contains("An error occurred while running the crew with trigger"));
    }

    #[tokio::test]
    async fn test_replay_without_history_is_wrapped_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig {
            model: "test-model".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            amount: "0".to_string(),
            agents_path: "does/not/exist.yaml".into(),
            tasks_path: "does/not/exist.yaml".into(),
        };
        let driver = Driver::with_run_log(
            config,
            RunLog::new(dir.path().join("run_log.json")),
        );

        let err = driver.replay("currency_audit_task").await.unwrap_err();
        assert!(err
            .to_string()
            .contains("An error occurred while replaying the crew"));
        assert!(err.to_string().contains("no recorded runs"));
    }
}
