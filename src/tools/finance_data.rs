//! Financial data tool
//!
//! Reads the local expense database and reports one category or the whole
//! document. The file is read-only from the crew's perspective.

use super::{banner, parse_args, Tool};
use crate::Result;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_DATA_PATH: &str = "db/expenses.json";

#[derive(Debug, Deserialize)]
struct FinanceArgs {
    /// One of fixed_expenses, credit_cards, debts, streaming_services, or "all".
    #[serde(default = "default_category")]
    category: String,
    #[serde(default = "default_file_path")]
    file_path: String,
}

fn default_category() -> String {
    "all".to_string()
}

fn default_file_path() -> String {
    DEFAULT_DATA_PATH.to_string()
}

pub struct FinanceDataTool;

impl FinanceDataTool {
    pub fn new() -> Self {
        Self
    }

    async fn report(&self, category: &str, file_path: &str) -> String {
        if !Path::new(file_path).exists() {
            return format!(
                "Error: The file {} was not found. Please ensure the database exists.",
                file_path
            );
        }

        let raw = match tokio::fs::read_to_string(file_path).await {
            Ok(raw) => raw,
            Err(e) => return format!("Unexpected error: {}", e),
        };

        let data: Value = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(_) => return "Error: Failed to decode JSON. Check the file format.".to_string(),
        };

        let Some(document) = data.as_object() else {
            return "Error: Failed to decode JSON. Check the file format.".to_string();
        };

        let slice = if category != "all" {
            match document.get(category) {
                Some(value) => {
                    let mut filtered = serde_json::Map::new();
                    filtered.insert(category.to_string(), value.clone());
                    Value::Object(filtered)
                }
                None => {
                    let available: Vec<&String> = document.keys().collect();
                    return format!(
                        "Error: Category '{}' not found. Available: {:?}",
                        category, available
                    );
                }
            }
        } else {
            data.clone()
        };

        let pretty = match serde_json::to_string_pretty(&slice) {
            Ok(pretty) => pretty,
            Err(e) => return format!("Unexpected error: {}", e),
        };

        [
            banner(),
            format!("FINANCIAL DATA REPORT - CATEGORY: {}", category.to_uppercase()),
            banner(),
            pretty,
            banner(),
            format!("Status: Data successfully retrieved from {}", file_path),
            banner(),
        ]
        .join("\n")
    }
}

impl Default for FinanceDataTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for FinanceDataTool {
    fn name(&self) -> &'static str {
        "finance_data"
    }

    fn description(&self) -> &'static str {
        "Reads financial data from db/expenses.json. \
         Categories: 'fixed_expenses', 'credit_cards', 'debts', \
         'streaming_services', or 'all'. \
         Credit cards: name, balance, interest_rate, cat (annual %), \
         credit_limit, payment_due_date. \
         Debts: description, total_remaining, monthly_payment. \
         Fixed expenses/streaming: description, amount, due_date. \
         Use for expense calculations, balance analysis, and debt \
         prioritization strategies."
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let args: FinanceArgs = parse_args(self.name(), args)?;
        Ok(self.report(&args.category, &args.file_path).await)
    }
}
