//! Ollama chat API client.

use crate::config::ModelConfig;
use crate::error::BenchError;
use crate::llm::CompletionService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for the completion client.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 600,
        }
    }
}

impl From<&ModelConfig> for CompletionConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.clone(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// Message in the chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Completion service backed by an Ollama server.
pub struct OllamaClient {
    config: CompletionConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new client. The HTTP client is reused across requests.
    pub fn new(config: CompletionConfig) -> Result<Self, BenchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BenchError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn build_request(&self, system: &str, user: &str) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage::new("system", system),
                ChatMessage::new("user", user),
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, BenchError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));
        let request = self.build_request(system, user);

        debug!(model = %self.config.model_name, chars = user.len(), "Sending completion request");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BenchError::Transport(format!(
                        "Request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    BenchError::Transport(format!(
                        "Cannot connect to Ollama at {}",
                        self.config.ollama_url
                    ))
                } else {
                    BenchError::Transport(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BenchError::Completion(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            BenchError::InvalidResponseFormat(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(chat_response.message.content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_config_from_model_config() {
        let model = ModelConfig {
            name: "qwen2.5:7b".to_string(),
            ollama_url: "http://gpu-box:11434".to_string(),
            temperature: 0.3,
            timeout_seconds: 42,
        };
        let config = CompletionConfig::from(&model);
        assert_eq!(config.model_name, "qwen2.5:7b");
        assert_eq!(config.ollama_url, "http://gpu-box:11434");
        assert_eq!(config.timeout_seconds, 42);
    }

    #[test]
    fn test_request_shape() {
        let client = OllamaClient::new(CompletionConfig::default()).unwrap();
        let request = client.build_request("be terse", "hello");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "llama3.2:latest");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
        assert!(value["options"]["temperature"].as_f64().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = OllamaClient::new(CompletionConfig {
            ollama_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..CompletionConfig::default()
        })
        .unwrap();

        let err = client.complete("sys", "user").await.unwrap_err();
        assert!(matches!(err, BenchError::Transport(_)));
    }
}
