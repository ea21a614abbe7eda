//! Ollama binding for the reasoning service.
//!
//! A session is a client-side conversation replayed against `/api/chat`
//! on every call. Opening a session checks that the server answers and
//! that the configured model is installed.

use crate::error::ServiceError;
use crate::llm::{ChatMessage, ReasoningService, ServiceConnector, Session};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the Ollama service.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Max messages kept in a session (sliding window)
    pub max_context_messages: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 300,
            max_context_messages: 10,
        }
    }
}

impl From<&crate::config::ModelConfig> for OllamaConfig {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.clone(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            max_context_messages: config.max_context_messages,
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
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
    message: ChatMessage,
}

/// Ollama `/api/tags` response.
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

/// Builds an [`OllamaService`] per pipeline run.
#[derive(Debug, Clone)]
pub struct OllamaConnector {
    config: OllamaConfig,
}

impl OllamaConnector {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }
}

impl ServiceConnector for OllamaConnector {
    fn connect(&self) -> Result<Arc<dyn ReasoningService>, ServiceError> {
        Ok(Arc::new(OllamaService::new(self.config.clone())?))
    }
}

/// Reasoning service backed by a local Ollama server.
pub struct OllamaService {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaService {
    pub fn new(config: OllamaConfig) -> Result<Self, ServiceError> {
        info!(
            "Initializing Ollama client with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                ServiceError::SessionCreation(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn describe_error(&self, e: reqwest::Error) -> String {
        if e.is_timeout() {
            format!("Request timed out after {}s", self.config.timeout_seconds)
        } else if e.is_connect() {
            format!(
                "Cannot connect to Ollama at {}. Is Ollama running?",
                self.config.ollama_url
            )
        } else {
            format!("Failed to send request: {}", e)
        }
    }
}

/// Whether an installed model tag satisfies the configured model name.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.strip_suffix(":latest") == Some(wanted))
}

#[async_trait]
impl ReasoningService for OllamaService {
    async fn open_session(&self) -> Result<Session, ServiceError> {
        let url = format!("{}/api/tags", self.config.ollama_url);
        debug!("Opening session: checking {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::SessionCreation(self.describe_error(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::SessionCreation(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let tags: OllamaTagsResponse = response.json().await.map_err(|e| {
            ServiceError::SessionCreation(format!("Failed to parse Ollama model list: {}", e))
        })?;

        if !tags
            .models
            .iter()
            .any(|m| model_matches(&m.name, &self.config.model_name))
        {
            return Err(ServiceError::SessionCreation(format!(
                "Model {} is not installed on {}",
                self.config.model_name, self.config.ollama_url
            )));
        }

        Ok(Session::new(
            SYSTEM_PROMPT,
            self.config.max_context_messages,
        ))
    }

    async fn send(&self, session: &mut Session, prompt: &str) -> Result<String, ServiceError> {
        let url = format!("{}/api/chat", self.config.ollama_url);

        let request = OllamaChatRequest {
            model: &self.config.model_name,
            messages: session.messages_with(prompt),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Send(self.describe_error(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Send(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Send(format!("Failed to parse Ollama response: {}", e)))?;

        let reply = chat_response.message.content;
        session.record(prompt, &reply);
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// System prompt opening every session.
const SYSTEM_PROMPT: &str = r#"You are an expert code analyzer specializing in correctness assessment and semantic understanding.
You receive source code fragments together with their context and answer the question asked about them.
Be precise, reference the code you are discussing, and do not invent behavior the code does not have."#;
