//! Process configuration
//!
//! `RuntimeConfig` is built once from the environment in `main` and passed
//! by reference; the crew itself is declared in two YAML documents keyed by
//! string identifier. Missing keys are configuration errors, not recovered.

use crate::error::CrewError;
use crate::models::{AgentSpec, TaskSpec};
use crate::Result;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_AGENTS_PATH: &str = "config/agents.yaml";
pub const DEFAULT_TASKS_PATH: &str = "config/tasks.yaml";

/// Environment-derived configuration.
///
/// `LLM` and `BASE_OLLAMA_URL` are fatal at startup when absent; `AMOUNT`
/// defaults to "0".
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Model identifier passed to the LLM endpoint.
    pub model: String,
    /// Base URL of the Ollama-compatible endpoint.
    pub base_url: String,
    /// Default payment amount for `run`.
    pub amount: String,
    pub agents_path: PathBuf,
    pub tasks_path: PathBuf,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        let model = env::var("LLM").map_err(|_| {
            CrewError::ConfigError("LLM environment variable is not set".to_string())
        })?;
        let base_url = env::var("BASE_OLLAMA_URL").map_err(|_| {
            CrewError::ConfigError("BASE_OLLAMA_URL environment variable is not set".to_string())
        })?;
        let amount = env::var("AMOUNT").unwrap_or_else(|_| "0".to_string());

        Ok(Self {
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            amount,
            agents_path: PathBuf::from(DEFAULT_AGENTS_PATH),
            tasks_path: PathBuf::from(DEFAULT_TASKS_PATH),
        })
    }
}

/// The declarative crew definition: agent specs keyed by id, task specs in
/// declaration order.
#[derive(Debug, Clone)]
pub struct CrewConfig {
    agents: HashMap<String, AgentSpec>,
    tasks: Vec<(String, TaskSpec)>,
}

impl CrewConfig {
    pub fn load(agents_path: &Path, tasks_path: &Path) -> Result<Self> {
        let agents_raw = std::fs::read_to_string(agents_path).map_err(|e| {
            CrewError::ConfigError(format!(
                "cannot read agent config {}: {}",
                agents_path.display(),
                e
            ))
        })?;
        let tasks_raw = std::fs::read_to_string(tasks_path).map_err(|e| {
            CrewError::ConfigError(format!(
                "cannot read task config {}: {}",
                tasks_path.display(),
                e
            ))
        })?;

        Self::parse(&agents_raw, &tasks_raw)
    }

    pub fn parse(agents_yaml: &str, tasks_yaml: &str) -> Result<Self> {
        let agents: HashMap<String, AgentSpec> = serde_yml::from_str(agents_yaml)?;

        // Tasks are parsed through a Value so declaration order survives;
        // execution order depends on it.
        let doc: serde_yml::Value = serde_yml::from_str(tasks_yaml)?;
        let mapping = doc.as_mapping().ok_or_else(|| {
            CrewError::ConfigError("task config must be a mapping of task ids".to_string())
        })?;

        let mut tasks = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let id = key
                .as_str()
                .ok_or_else(|| {
                    CrewError::ConfigError("task ids must be strings".to_string())
                })?
                .to_string();
            let spec: TaskSpec = serde_yml::from_value(value.clone())?;
            tasks.push((id, spec));
        }

        if tasks.is_empty() {
            return Err(CrewError::ConfigError(
                "task config declares no tasks".to_string(),
            ));
        }

        Ok(Self { agents, tasks })
    }

    pub fn agent(&self, id: &str) -> Result<&AgentSpec> {
        self.agents.get(id).ok_or_else(|| {
            CrewError::ConfigError(format!("agent '{}' is not defined in the agent config", id))
        })
    }

    /// Task specs in declaration order.
    pub fn tasks(&self) -> &[(String, TaskSpec)] {
        &self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENTS: &str = r#"
financial_analyst:
  role: Senior Financial Analyst
  goal: Audit the payment
  backstory: Veteran of cross-border banking.
  tools:
    - exchange_rate
"#;

    const TASKS: &str = r#"
currency_audit_task:
  description: Audit {amount_received} {currency}
  expected_output: A rate summary
  agent: financial_analyst
debt_strategy_task:
  description: Plan the payoff
  expected_output: A payoff plan
  agent: financial_analyst
  context:
    - currency_audit_task
"#;

    #[test]
    fn test_parse_preserves_task_order() {
        let crew = CrewConfig::parse(AGENTS, TASKS).unwrap();
        let ids: Vec<&str> = crew.tasks().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["currency_audit_task", "debt_strategy_task"]);
        assert_eq!(crew.tasks()[1].1.context, vec!["currency_audit_task"]);
    }

    #[test]
    fn test_missing_agent_is_config_error() {
        let crew = CrewConfig::parse(AGENTS, TASKS).unwrap();
        assert!(crew.agent("financial_analyst").is_ok());
        let err = crew.agent("nonexistent").unwrap_err();
        assert!(matches!(err, CrewError::ConfigError(_)));
    }

    #[test]
    fn test_empty_task_config_rejected() {
        let err = CrewConfig::parse(AGENTS, "{}").unwrap_err();
        assert!(matches!(err, CrewError::ConfigError(_)));
    }
}
