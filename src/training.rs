//! Training and evaluation loops
//!
//! `train` repeats the pipeline with fixed inputs and appends one JSON
//! record per iteration to the named file. `evaluate` repeats the pipeline
//! and has a judge model score each final output from 1 to 10.

use crate::error::CrewError;
use crate::models::{EvalScore, PipelineInputs, RunRecord};
use crate::ollama::{ChatMessage, OllamaClient};
use crate::pipeline::Pipeline;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One training iteration, as written to the training file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub iteration: u32,
    pub inputs: PipelineInputs,
    pub task_outputs: Vec<(String, String)>,
    pub final_output: String,
    pub recorded_at: DateTime<Utc>,
}

impl TrainingRecord {
    fn from_run(iteration: u32, run: &RunRecord) -> Self {
        Self {
            iteration,
            inputs: run.inputs.clone(),
            task_outputs: run
                .tasks
                .iter()
                .map(|t| (t.task_id.clone(), t.output.clone()))
                .collect(),
            final_output: run.final_output.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// Run the pipeline `n_iterations` times and append the results to
/// `filename` as a JSON array of training records.
pub async fn train(
    pipeline: &Pipeline,
    inputs: &PipelineInputs,
    n_iterations: u32,
    filename: &str,
) -> Result<()> {
    if n_iterations == 0 {
        return Err(CrewError::ConfigError(
            "training requires at least one iteration".to_string(),
        ));
    }

    let mut records = load_training_file(filename).await?;

    for iteration in 1..=n_iterations {
        info!(iteration, n_iterations, "Training iteration starting");
        let run = pipeline.kickoff(inputs).await?;
        records.push(TrainingRecord::from_run(iteration, &run));
    }

    if let Some(parent) = Path::new(filename).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(filename, serde_json::to_string_pretty(&records)?).await?;

    info!(filename, count = records.len(), "Training records written");
    Ok(())
}

async fn load_training_file(filename: &str) -> Result<Vec<TrainingRecord>> {
    if !Path::new(filename).exists() {
        return Ok(Vec::new());
    }
    let raw = tokio::fs::read_to_string(filename).await?;
    serde_json::from_str(&raw).map_err(|e| {
        CrewError::ConfigError(format!("cannot parse training file {}: {}", filename, e))
    })
}

/// Run the pipeline `n_iterations` times and score each final output with
/// the judge model.
pub async fn evaluate(
    pipeline: &Pipeline,
    judge: &OllamaClient,
    inputs: &PipelineInputs,
    n_iterations: u32,
) -> Result<Vec<EvalScore>> {
    if n_iterations == 0 {
        return Err(CrewError::ConfigError(
            "evaluation requires at least one iteration".to_string(),
        ));
    }

    let mut scores = Vec::with_capacity(n_iterations as usize);

    for iteration in 1..=n_iterations {
        info!(iteration, n_iterations, "Evaluation iteration starting");
        let run = pipeline.kickoff(inputs).await?;

        let prompt = judge_prompt(&run.final_output);
        let reply = judge
            .chat(&[ChatMessage::user(prompt)], 0.0, None)
            .await
            .map_err(|e| CrewError::LlmError(format!("judge '{}': {}", judge.model(), e)))?;

        let (score, rationale) = parse_score(&reply)?;
        scores.push(EvalScore {
            iteration,
            score,
            rationale,
        });
    }

    Ok(scores)
}

/// Mean of the collected scores.
pub fn mean_score(scores: &[EvalScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| f64::from(s.score)).sum::<f64>() / scores.len() as f64
}

fn judge_prompt(final_output: &str) -> String {
    format!(
        r#"You are evaluating the final report of a financial analysis crew.

Score the report from 1 (unusable) to 10 (excellent) for accuracy of
structure, clarity, and completeness of the exchange-rate summary and the
debt payoff plan.

REPORT:
{}

Return ONLY valid JSON, no explanation text:
{{"score": <1-10>, "rationale": "<one sentence>"}}
"#,
        final_output
    )
}

/// Parse the judge's reply, stripping code fences the model may add.
fn parse_score(reply: &str) -> Result<(u8, String)> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let candidate = match cleaned.find('{') {
        Some(start) => {
            let end = cleaned.rfind('}').ok_or_else(|| {
                CrewError::LlmError(format!("judge reply is not JSON: {}", reply))
            })?;
            &cleaned[start..=end]
        }
        None => cleaned,
    };

    let parsed: serde_json::Value = serde_json::from_str(candidate)
        .map_err(|e| CrewError::LlmError(format!("judge reply parse error: {} | raw={}", e, reply)))?;

    let score = parsed
        .get("score")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| CrewError::LlmError(format!("judge reply has no score: {}", reply)))?;
    let score = score.clamp(1, 10) as u8;

    let rationale = parsed
        .get("rationale")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok((score, rationale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_bare_json() {
        let (score, rationale) =
            parse_score(r#"{"score": 7, "rationale": "solid but terse"}"#).unwrap();
        assert_eq!(score, 7);
        assert_eq!(rationale, "solid but terse");
    }

    #[test]
    fn test_parse_score_fenced_with_prose() {
        let reply = "Here is my verdict:\n```json\n{\"score\": 9, \"rationale\": \"thorough\"}\n```";
        let (score, _) = parse_score(reply).unwrap();
        assert_eq!(score, 9);
    }

    #[test]
    fn test_parse_score_clamps_out_of_range() {
        let (score, _) = parse_score(r#"{"score": 15, "rationale": "x"}"#).unwrap();
        assert_eq!(score, 10);
    }

    #[test]
    fn test_parse_score_rejects_non_json() {
        assert!(parse_score("a fine report indeed").is_err());
    }

    #[test]
    fn test_mean_score() {
        let scores = vec![
            EvalScore { iteration: 1, score: 6, rationale: String::new() },
            EvalScore { iteration: 2, score: 9, rationale: String::new() },
        ];
        assert!((mean_score(&scores) - 7.5).abs() < f64::EPSILON);
        assert_eq!(mean_score(&[]), 0.0);
    }
}
