//! Tool trait and registry
//!
//! Tools wrap one external data source each (rate APIs, web search, local
//! JSON reads) behind a uniform call contract: validated input in, text out.
//! Operation failures are rendered into the returned text so the calling
//! agent can reason about them; the only `Err` a tool invocation produces
//! is a schema rejection, before the operation body runs.

use crate::error::CrewError;
use crate::Result;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

pub mod exchange_rate;
pub mod finance_data;
pub mod web_search;

pub use exchange_rate::{ExchangeRateBackupTool, ExchangeRateTool};
pub use finance_data::FinanceDataTool;
pub use web_search::WebSearchTool;

/// Timeout applied to every tool-level network call.
pub(crate) const TOOL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Validate `args` against the tool's input schema and run the
    /// operation. The returned text carries the result or a descriptive
    /// error message; `Err` means the schema layer rejected the input.
    async fn invoke(&self, args: serde_json::Value) -> Result<String>;
}

/// Deserialize tool arguments, mapping failures to a schema rejection.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: serde_json::Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| CrewError::InvalidToolInput(format!("{}: {}", tool, e)))
}

/// Separator line used by the report-style tool outputs.
pub(crate) fn banner() -> String {
    "=".repeat(80)
}

/// Local timestamp in the format the report blocks use.
pub(crate) fn query_time() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Tool registry for looking up and invoking tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the default registry with the financial report tools.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(ExchangeRateTool::new()));
    registry.register(Arc::new(ExchangeRateBackupTool::new()));
    registry.register(Arc::new(WebSearchTool::new()));
    registry.register(Arc::new(FinanceDataTool::new()));

    registry
}
