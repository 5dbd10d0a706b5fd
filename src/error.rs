//! Error types for the financial report crew

use thiserror::Error;

/// Result type alias for crew operations
pub type Result<T> = std::result::Result<T, CrewError>;

#[derive(Error, Debug)]
pub enum CrewError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Invalid trigger payload: {0}")]
    TriggerPayloadError(String),

    #[error("Replay error: {0}")]
    ReplayError(String),

    #[error("Run log error: {0}")]
    RunLogError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yml::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
