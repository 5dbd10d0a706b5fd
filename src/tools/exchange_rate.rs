//! Exchange rate tools
//!
//! Two independent providers with the same contract; there is no automatic
//! failover between them — the calling agent picks one.

use super::{banner, parse_args, query_time, Tool, TOOL_TIMEOUT};
use crate::Result;
use serde::Deserialize;
use serde_json::Value;

const PRIMARY_ENDPOINT: &str = "https://api.exchangerate-api.com/v4/latest";
const BACKUP_ENDPOINT: &str = "https://api.frankfurter.app/latest";

#[derive(Debug, Deserialize)]
struct ExchangeRateArgs {
    /// The base currency code (e.g. USD, EUR, GBP)
    #[serde(default = "default_base")]
    base_currency: String,
    /// The target currency code to convert to (e.g. MXN, CAD, JPY)
    #[serde(default = "default_target")]
    target_currency: String,
}

fn default_base() -> String {
    "USD".to_string()
}

fn default_target() -> String {
    "MXN".to_string()
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(TOOL_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
}

/// Primary provider: exchangerate-api.com (free tier, no API key).
pub struct ExchangeRateTool {
    client: reqwest::Client,
    endpoint: String,
}

impl ExchangeRateTool {
    pub fn new() -> Self {
        Self::with_endpoint(PRIMARY_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: build_client(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, base: &str, target: &str) -> String {
        let url = format!("{}/{}", self.endpoint, base);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return "Error: Request timed out. Please try again.".to_string()
            }
            Err(e) => return format!("Error fetching exchange rate: {}", e),
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => return format!("Error fetching exchange rate: {}", e),
        };

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => return format!("Error parsing response data: {}", e),
        };

        let base_code = data
            .get("base")
            .and_then(Value::as_str)
            .unwrap_or(base)
            .to_string();
        let date = data
            .get("date")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let time_last_updated = data
            .get("time_last_updated")
            .map(field_text)
            .unwrap_or_else(|| "Unknown".to_string());

        let Some(rates) = data.get("rates").and_then(Value::as_object) else {
            return "Error parsing response data: Missing key 'rates'".to_string();
        };

        let Some(rate) = rates.get(target) else {
            let available: Vec<&str> = rates.keys().take(10).map(String::as_str).collect();
            return format!(
                "Error: Currency code '{}' not found. Available currencies: {}...",
                target,
                available.join(", ")
            );
        };

        [
            banner(),
            "REAL-TIME EXCHANGE RATE DATA".to_string(),
            banner(),
            format!("Query Time: {}", query_time()),
            format!("Data Last Updated: {}", time_last_updated),
            format!("Rate Date: {}", date),
            String::new(),
            format!("Base Currency: {}", base_code),
            format!("Target Currency: {}", target),
            String::new(),
            format!("EXCHANGE RATE: 1 {} = {} {}", base_code, rate, target),
            String::new(),
            banner(),
            "Source: exchangerate-api.com".to_string(),
            banner(),
        ]
        .join("\n")
    }
}

impl Default for ExchangeRateTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for ExchangeRateTool {
    fn name(&self) -> &'static str {
        "exchange_rate"
    }

    fn description(&self) -> &'static str {
        "Gets real-time exchange rates between two currencies. \
         Returns the current rate, timestamp, and date of the data. \
         Useful for getting accurate USD to MXN or any other currency pair. \
         Input: base_currency (default USD), target_currency (default MXN)."
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let args: ExchangeRateArgs = parse_args(self.name(), args)?;
        let base = args.base_currency.to_uppercase();
        let target = args.target_currency.to_uppercase();
        Ok(self.fetch(&base, &target).await)
    }
}

/// Backup provider: frankfurter.app (European Central Bank data).
pub struct ExchangeRateBackupTool {
    client: reqwest::Client,
    endpoint: String,
}

impl ExchangeRateBackupTool {
    pub fn new() -> Self {
        Self::with_endpoint(BACKUP_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: build_client(),
            endpoint: endpoint.to_string(),
        }
    }

    async fn fetch(&self, base: &str, target: &str) -> String {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("from", base), ("to", target)]);

        let data: Value = match request.send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json().await {
                    Ok(data) => data,
                    Err(e) => return format!("Backup API error: {}", e),
                },
                Err(e) => return format!("Backup API error: {}", e),
            },
            Err(e) => return format!("Backup API error: {}", e),
        };

        let base_code = data
            .get("base")
            .and_then(Value::as_str)
            .unwrap_or(base)
            .to_string();
        let date = data
            .get("date")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");

        let rate = data
            .get("rates")
            .and_then(Value::as_object)
            .and_then(|rates| rates.get(target));
        let Some(rate) = rate else {
            return format!(
                "Error: Currency pair {}/{} not supported by this API.",
                base, target
            );
        };

        [
            banner(),
            "EXCHANGE RATE DATA (BACKUP SOURCE)".to_string(),
            banner(),
            format!("Query Time: {}", query_time()),
            format!("Rate Date: {}", date),
            String::new(),
            format!("EXCHANGE RATE: 1 {} = {} {}", base_code, rate, target),
            String::new(),
            banner(),
            "Source: frankfurter.app (European Central Bank)".to_string(),
            banner(),
        ]
        .join("\n")
    }
}

impl Default for ExchangeRateBackupTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for ExchangeRateBackupTool {
    fn name(&self) -> &'static str {
        "exchange_rate_backup"
    }

    fn description(&self) -> &'static str {
        "Backup tool to get real-time exchange rates if the primary API \
         fails. Uses frankfurter.app for European Central Bank data. \
         Input: base_currency (default USD), target_currency (default MXN)."
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let args: ExchangeRateArgs = parse_args(self.name(), args)?;
        let base = args.base_currency.to_uppercase();
        let target = args.target_currency.to_uppercase();
        Ok(self.fetch(&base, &target).await)
    }
}

/// Render a JSON scalar without quoting strings.
fn field_text(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PRIMARY_BODY: &str = r#"{
        "base": "USD",
        "date": "2025-08-04",
        "time_last_updated": 1754265601,
        "rates": {"MXN": 18.72, "EUR": 0.91, "CAD": 1.37}
    }"#;

    #[tokio::test]
    async fn test_primary_formats_single_rate_line() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/USD")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PRIMARY_BODY)
            .create_async()
            .await;

        let tool = ExchangeRateTool::with_endpoint(&server.url());
        let output = tool
            .invoke(json!({"base_currency": "usd", "target_currency": "mxn"}))
            .await
            .unwrap();

        let rate_lines: Vec<&str> = output
            .lines()
            .filter(|l| l.starts_with("EXCHANGE RATE:"))
            .collect();
        assert_eq!(rate_lines, vec!["EXCHANGE RATE: 1 USD = 18.72 MXN"]);
        assert!(output.contains("Rate Date: 2025-08-04"));
        assert!(output.contains("Data Last Updated: 1754265601"));
    }

    #[tokio::test]
    async fn test_primary_defaults_to_usd_mxn() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/USD")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PRIMARY_BODY)
            .create_async()
            .await;

        let tool = ExchangeRateTool::with_endpoint(&server.url());
        let output = tool.invoke(json!({})).await.unwrap();

        assert!(output.contains("Target Currency: MXN"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_primary_unknown_target_is_error_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/USD")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PRIMARY_BODY)
            .create_async()
            .await;

        let tool = ExchangeRateTool::with_endpoint(&server.url());
        let output = tool
            .invoke(json!({"target_currency": "XXX"}))
            .await
            .unwrap();

        assert!(output.starts_with("Error:"));
        assert!(output.contains("'XXX'"));
        assert!(output.contains("MXN"));
    }

    #[tokio::test]
    async fn test_primary_http_failure_is_error_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/USD")
            .with_status(503)
            .create_async()
            .await;

        let tool = ExchangeRateTool::with_endpoint(&server.url());
        let output = tool.invoke(json!({})).await.unwrap();
        assert!(output.starts_with("Error fetching exchange rate:"));
    }

    #[tokio::test]
    async fn test_backup_formats_rate_line() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"base": "USD", "date": "2025-08-04", "rates": {"MXN": 18.69}}"#)
            .create_async()
            .await;

        let tool = ExchangeRateBackupTool::with_endpoint(&server.url());
        let output = tool.invoke(json!({})).await.unwrap();

        assert!(output.contains("EXCHANGE RATE: 1 USD = 18.69 MXN"));
        assert!(output.contains("BACKUP SOURCE"));
    }

    #[tokio::test]
    async fn test_backup_unsupported_pair_is_error_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"base": "USD", "date": "2025-08-04", "rates": {}}"#)
            .create_async()
            .await;

        let tool = ExchangeRateBackupTool::with_endpoint(&server.url());
        let output = tool
            .invoke(json!({"target_currency": "XAU"}))
            .await
            .unwrap();

        assert!(output.starts_with("Error: Currency pair USD/XAU not supported"));
    }

    #[tokio::test]
    async fn test_non_object_args_rejected_by_schema() {
        let tool = ExchangeRateTool::new();
        let err = tool.invoke(json!("USD to MXN")).await.unwrap_err();
        assert!(matches!(err, crate::CrewError::InvalidToolInput(_)));
    }
}
