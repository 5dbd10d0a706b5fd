//! Sequential task pipeline
//!
//! Tasks run one at a time in a topological order of their declared
//! context edges; a task never starts before every task it depends on has
//! produced output. Any task failure aborts the remaining chain.

use crate::agent::Agent;
use crate::config::{CrewConfig, RuntimeConfig};
use crate::error::CrewError;
use crate::models::{PipelineInputs, RunRecord, TaskRecord, TaskSpec};
use crate::ollama::OllamaClient;
use crate::runlog::compute_input_hash;
use crate::tools::ToolRegistry;
use crate::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

pub struct Pipeline {
    crew: CrewConfig,
    /// Task ids in execution order.
    order: Vec<String>,
    llm: OllamaClient,
    registry: ToolRegistry,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("order", &self.order)
            .finish()
    }
}

impl Pipeline {
    /// Assemble the pipeline: resolve every task's agent and tools, and
    /// compute the execution order. All wiring errors surface here, before
    /// anything runs.
    pub fn assemble(
        config: &RuntimeConfig,
        crew: CrewConfig,
        registry: ToolRegistry,
    ) -> Result<Self> {
        let order = topological_order(crew.tasks())?;

        for (task_id, spec) in crew.tasks() {
            let agent = crew.agent(&spec.agent).map_err(|_| {
                CrewError::ConfigError(format!(
                    "task '{}' references undefined agent '{}'",
                    task_id, spec.agent
                ))
            })?;

            for tool in &agent.tools {
                if !registry.contains(tool) {
                    return Err(CrewError::ConfigError(format!(
                        "agent '{}' lists unregistered tool '{}'",
                        spec.agent, tool
                    )));
                }
            }
        }

        let llm = OllamaClient::new(&config.base_url, &config.model);

        Ok(Self {
            crew,
            order,
            llm,
            registry,
        })
    }

    pub fn task_ids(&self) -> &[String] {
        &self.order
    }

    /// Execute every task once, in order.
    pub async fn kickoff(&self, inputs: &PipelineInputs) -> Result<RunRecord> {
        self.run_from(0, inputs, HashMap::new()).await
    }

    /// Re-execute the pipeline from `task_id` onward, reusing the recorded
    /// outputs of earlier tasks as context.
    pub async fn kickoff_from(&self, task_id: &str, prior: &RunRecord) -> Result<RunRecord> {
        let position = self
            .order
            .iter()
            .position(|id| id == task_id)
            .ok_or_else(|| {
                CrewError::ReplayError(format!(
                    "task '{}' is not part of the pipeline (tasks: {})",
                    task_id,
                    self.order.join(", ")
                ))
            })?;

        let mut seeded = HashMap::new();
        for id in &self.order[..position] {
            let record = prior
                .tasks
                .iter()
                .find(|t| &t.task_id == id)
                .ok_or_else(|| {
                    CrewError::ReplayError(format!(
                        "recorded run {} has no output for predecessor task '{}'",
                        prior.run_id, id
                    ))
                })?;
            seeded.insert(id.clone(), record.output.clone());
        }

        self.run_from(position, &prior.inputs, seeded).await
    }

    async fn run_from(
        &self,
        start: usize,
        inputs: &PipelineInputs,
        mut outputs: HashMap<String, String>,
    ) -> Result<RunRecord> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut records = Vec::with_capacity(self.order.len() - start);

        info!(
            run_id = %run_id,
            task_count = self.order.len() - start,
            "Pipeline starting"
        );

        for task_id in &self.order[start..] {
            let spec = self.task_spec(task_id)?;
            let task = spec.interpolated(inputs);
            let agent_spec = self.crew.agent(&spec.agent)?.interpolated(inputs);

            // Ordering invariant: every context output exists by now.
            let mut context_blocks = Vec::with_capacity(spec.context.len());
            for dep in &spec.context {
                let output = outputs.get(dep).ok_or_else(|| {
                    CrewError::PipelineError(format!(
                        "task '{}' started before its context task '{}' produced output",
                        task_id, dep
                    ))
                })?;
                context_blocks.push(output.clone());
            }
            let context = context_blocks.join("\n\n");

            debug!(task_id = %task_id, agent = %spec.agent, "Executing task");
            let start_time = Instant::now();

            let agent = Agent::new(&spec.agent, &agent_spec, &self.llm, &self.registry);
            let output = agent.execute(&task, &context).await.map_err(|e| {
                CrewError::TaskError(format!("task '{}' failed: {}", task_id, e))
            })?;

            let execution_time_ms = start_time.elapsed().as_millis() as u64;

            if let Some(path) = &spec.output_file {
                write_output_file(path, &output).await?;
                info!(task_id = %task_id, path = %path, "Task output written");
            }

            records.push(TaskRecord {
                task_id: task_id.clone(),
                agent: spec.agent.clone(),
                output: output.clone(),
                execution_time_ms,
                completed_at: Utc::now(),
            });

            outputs.insert(task_id.clone(), output);
        }

        let final_output = records
            .last()
            .map(|r| r.output.clone())
            .unwrap_or_default();

        info!(run_id = %run_id, "Pipeline completed");

        Ok(RunRecord {
            run_id,
            inputs: inputs.clone(),
            input_hash: compute_input_hash(inputs),
            tasks: records,
            final_output,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn task_spec(&self, task_id: &str) -> Result<&TaskSpec> {
        self.crew
            .tasks()
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, spec)| spec)
            .ok_or_else(|| {
                CrewError::PipelineError(format!("task '{}' disappeared from the crew", task_id))
            })
    }
}

/// Stable topological order over the declared context edges: tasks are
/// emitted in declaration order as their dependencies become available.
/// Unknown references and cycles are configuration errors.
fn topological_order(tasks: &[(String, TaskSpec)]) -> Result<Vec<String>> {
    let declared: HashSet<&str> = tasks.iter().map(|(id, _)| id.as_str()).collect();

    for (task_id, spec) in tasks {
        for dep in &spec.context {
            if !declared.contains(dep.as_str()) {
                return Err(CrewError::ConfigError(format!(
                    "task '{}' references unknown context task '{}'",
                    task_id, dep
                )));
            }
        }
    }

    let mut order = Vec::with_capacity(tasks.len());
    let mut emitted: HashSet<&str> = HashSet::with_capacity(tasks.len());

    while order.len() < tasks.len() {
        let next = tasks.iter().find(|(id, spec)| {
            !emitted.contains(id.as_str())
                && spec.context.iter().all(|dep| emitted.contains(dep.as_str()))
        });

        match next {
            Some((id, _)) => {
                emitted.insert(id.as_str());
                order.push(id.clone());
            }
            None => {
                let stuck: Vec<&str> = tasks
                    .iter()
                    .filter(|(id, _)| !emitted.contains(id.as_str()))
                    .map(|(id, _)| id.as_str())
                    .collect();
                return Err(CrewError::ConfigError(format!(
                    "cyclic context dependencies among tasks: {}",
                    stuck.join(", ")
                )));
            }
        }
    }

    Ok(order)
}

async fn write_output_file(path: &str, output: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, output).await?;
    Ok(())
}
