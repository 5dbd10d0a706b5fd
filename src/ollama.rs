//! Ollama chat client
//!
//! Thin client for an Ollama-compatible `/api/chat` endpoint.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::CrewError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Reusable chat client (connection-pooled)
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

/// One chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat completion request and return the model's reply text.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        stop: Option<&[String]>,
    ) -> crate::Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature,
                stop: stop.map(<[String]>::to_vec),
            },
        };

        debug!(model = %self.model, "Calling chat endpoint");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat request failed: {}", e);
                CrewError::LlmError(format!("chat request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Chat endpoint error response: {}", body);
            return Err(CrewError::LlmError(format!(
                "chat endpoint returned {}: {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat response: {}", e);
            CrewError::LlmError(format!("chat response parse error: {}", e))
        })?;

        let content = chat_response.message.content.trim().to_string();
        if content.is_empty() {
            return Err(CrewError::LlmError(
                "empty completion from model".to_string(),
            ));
        }

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let messages = vec![
            ChatMessage::system("You are a financial analyst"),
            ChatMessage::user("What is the USD/MXN rate?"),
        ];
        let request = ChatRequest {
            model: "deepseek-r1:latest",
            messages: &messages,
            stream: false,
            options: ChatOptions {
                temperature: 0.2,
                stop: None,
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("deepseek-r1:latest"));
        assert!(json.contains("USD/MXN"));
        assert!(!json.contains("stop"));
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": {"role": "assistant", "content": "17.19"}}"#)
            .create_async()
            .await;

        let client = OllamaClient::new(&server.url(), "test-model");
        let reply = client
            .chat(&[ChatMessage::user("rate?")], 0.2, None)
            .await
            .unwrap();

        assert_eq!(reply, "17.19");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_error_status_is_llm_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let client = OllamaClient::new(&server.url(), "test-model");
        let err = client
            .chat(&[ChatMessage::user("rate?")], 0.2, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CrewError::LlmError(_)));
    }
}
