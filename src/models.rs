//! Core data models for the financial report crew

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

//
// ================= Agent & Task Specs =================
//

/// Declarative agent definition, loaded from `config/agents.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Names of registered tools this agent may invoke, in preference order.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Maximum tool-call rounds before the agent must answer.
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Optional stop sequences passed through to the model.
    #[serde(default)]
    pub stop: Option<Vec<String>>,
}

fn default_max_iter() -> u32 {
    5
}

fn default_temperature() -> f32 {
    0.2
}

/// Declarative task definition, loaded from `config/tasks.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Instruction template; `{name}` placeholders are filled from the
    /// pipeline inputs at kickoff.
    pub description: String,
    pub expected_output: String,
    /// Id of the agent that executes this task.
    pub agent: String,
    /// Ids of predecessor tasks whose output is injected as context.
    #[serde(default)]
    pub context: Vec<String>,
    /// Optional relative path the task's output is written to.
    #[serde(default)]
    pub output_file: Option<String>,
}

impl TaskSpec {
    /// Copy of this spec with the input placeholders filled in.
    pub fn interpolated(&self, inputs: &PipelineInputs) -> TaskSpec {
        TaskSpec {
            description: inputs.interpolate(&self.description),
            expected_output: inputs.interpolate(&self.expected_output),
            ..self.clone()
        }
    }
}

impl AgentSpec {
    /// Copy of this spec with the input placeholders filled in.
    pub fn interpolated(&self, inputs: &PipelineInputs) -> AgentSpec {
        AgentSpec {
            role: inputs.interpolate(&self.role),
            goal: inputs.interpolate(&self.goal),
            backstory: inputs.interpolate(&self.backstory),
            ..self.clone()
        }
    }
}

//
// ================= Pipeline Inputs =================
//

/// Named values supplied fresh for every pipeline invocation.
///
/// Values are interpolated into task and agent templates; the optional
/// trigger payload is carried alongside for record-keeping only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineInputs {
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub trigger_payload: Option<serde_json::Value>,
}

impl PipelineInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn with_trigger_payload(mut self, payload: serde_json::Value) -> Self {
        self.trigger_payload = Some(payload);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replace every `{key}` occurrence with its value. Placeholders that
    /// name no input are left intact.
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.values {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }
}

//
// ================= Run Artifacts =================
//

/// Output of one executed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub agent: String,
    pub output: String,
    pub execution_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// One completed pipeline run, as persisted to the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub inputs: PipelineInputs,
    /// SHA-256 over the canonical JSON of the inputs.
    pub input_hash: String,
    pub tasks: Vec<TaskRecord>,
    pub final_output: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One scored evaluation iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalScore {
    pub iteration: u32,
    pub score: u8,
    pub rationale: String,
}

impl fmt::Display for EvalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iteration {}: {}/10 - {}", self.iteration, self.score, self.rationale)
    }
}
