//! Agent executor
//!
//! An agent executes exactly one task: it prompts the model with its role,
//! the task instructions, and the predecessor context, then loops over
//! bounded tool-call rounds until the model answers in plain text.

use crate::error::CrewError;
use crate::models::{AgentSpec, TaskSpec};
use crate::ollama::{ChatMessage, OllamaClient};
use crate::tools::ToolRegistry;
use crate::Result;
use serde_json::Value;
use tracing::{debug, warn};

pub struct Agent<'a> {
    id: &'a str,
    spec: &'a AgentSpec,
    llm: &'a OllamaClient,
    registry: &'a ToolRegistry,
}

/// A tool invocation requested by the model.
#[derive(Debug, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub input: Value,
}

impl<'a> Agent<'a> {
    pub fn new(
        id: &'a str,
        spec: &'a AgentSpec,
        llm: &'a OllamaClient,
        registry: &'a ToolRegistry,
    ) -> Self {
        Self {
            id,
            spec,
            llm,
            registry,
        }
    }

    /// Execute one task and return its final output text.
    pub async fn execute(&self, task: &TaskSpec, context: &str) -> Result<String> {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(self.task_prompt(task, context)),
        ];

        for round in 0..self.spec.max_iter {
            let reply = self.chat(&messages).await?;

            let Some(call) = parse_tool_call(&reply) else {
                debug!(agent = %self.id, round, "Final answer produced");
                return Ok(reply);
            };

            debug!(agent = %self.id, tool = %call.tool, round, "Tool call requested");
            let observation = self.dispatch(&call).await;

            messages.push(ChatMessage::assistant(reply));
            messages.push(ChatMessage::user(format!(
                "Observation from {}:\n{}\n\nUse this observation to continue. \
                 Reply with another tool call, or with your final answer as plain text.",
                call.tool, observation
            )));
        }

        warn!(agent = %self.id, max_iter = self.spec.max_iter, "Tool budget exhausted");
        messages.push(ChatMessage::user(
            "Tool budget exhausted. Provide your final answer now, without calling any tools.",
        ));
        self.chat(&messages).await
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.llm
            .chat(messages, self.spec.temperature, self.spec.stop.as_deref())
            .await
            .map_err(|e| CrewError::LlmError(format!("agent '{}': {}", self.id, e)))
    }

    /// Invoke the requested tool; every failure is rendered as observation
    /// text so the model can react to it.
    async fn dispatch(&self, call: &ToolCall) -> String {
        if !self.spec.tools.iter().any(|t| t == &call.tool) {
            return format!(
                "Error: Tool '{}' is not available to you. Available tools: {}",
                call.tool,
                self.spec.tools.join(", ")
            );
        }

        match self.registry.get(&call.tool) {
            Some(tool) => match tool.invoke(call.input.clone()).await {
                Ok(text) => text,
                Err(e) => format!("Error: {}", e),
            },
            None => format!("Error: Tool '{}' is not registered.", call.tool),
        }
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}.\n\nYour goal: {}\n\nBackstory: {}",
            self.spec.role, self.spec.goal, self.spec.backstory
        );

        if !self.spec.tools.is_empty() {
            let mut listing = String::new();
            for name in &self.spec.tools {
                if let Some(tool) = self.registry.get(name) {
                    listing.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
                }
            }
            prompt.push_str(&format!(
                "\n\nYou may use the following tools:\n{}\n\
                 To use a tool, reply with ONLY a JSON object of the form:\n\
                 {{\"tool\": \"<tool name>\", \"input\": {{<arguments>}}}}\n\
                 No other text. When you have enough information, reply with \
                 your final answer as plain text instead.",
                listing
            ));
        }

        prompt
    }

    fn task_prompt(&self, task: &TaskSpec, context: &str) -> String {
        let mut prompt = format!(
            "Current task:\n{}\n\nExpected output:\n{}",
            task.description, task.expected_output
        );

        if !context.is_empty() {
            prompt.push_str(&format!("\n\nContext from previous tasks:\n{}", context));
        }

        prompt
    }
}

/// Extract a `{"tool": ..., "input": ...}` request from a model reply.
///
/// The model sometimes wraps the object in a ```json fence or leading
/// prose; anything that does not contain such an object is a final answer.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let candidate = if cleaned.starts_with('{') {
        cleaned
    } else {
        let start = cleaned.find('{')?;
        let end = cleaned.rfind('}')?;
        if end <= start {
            return None;
        }
        &cleaned[start..=end]
    };

    let parsed: Value = serde_json::from_str(candidate).ok()?;
    let tool = parsed.get("tool")?.as_str()?.to_string();
    let input = parsed
        .get("input")
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    Some(ToolCall { tool, input })
}
