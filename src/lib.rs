//! Financial report crew
//!
//! A small sequential multi-agent pipeline that:
//! - Wires agents and tasks from YAML configuration into a linear chain
//! - Exposes HTTP/JSON tool adapters (exchange rates, web search, local
//!   financial records) behind one schema-validated contract
//! - Drives an Ollama-compatible model through bounded tool-call rounds
//! - Records every run for replay and integrity verification
//!
//! PIPELINE: INPUTS → TASK 1 → TASK 2 → ... → REPORT

pub mod agent;
pub mod config;
pub mod driver;
pub mod error;
pub mod models;
pub mod ollama;
pub mod pipeline;
pub mod runlog;
pub mod tools;
pub mod training;

pub use error::{CrewError, Result};

// Re-export common types
pub use models::*;
