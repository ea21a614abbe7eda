//! Reasoning-service access.
//!
//! This module defines the seam to the external text-in/text-out service,
//! its Ollama binding and the retrying client used by the analyzers.

pub mod client;
pub mod ollama;

pub use client::{AnalysisClient, CallFailure, ClientConfig};
pub use ollama::{OllamaConfig, OllamaConnector};

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A conversation with the reasoning service.
///
/// Holds the system prompt and a sliding window of the latest exchanges.
#[derive(Debug, Clone)]
pub struct Session {
    system: ChatMessage,
    history: Vec<ChatMessage>,
    max_history: usize,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>, max_history: usize) -> Self {
        Self {
            system: ChatMessage::system(system_prompt),
            history: Vec::new(),
            max_history,
        }
    }

    /// Messages to send for a new prompt: system, history, then the prompt.
    pub fn messages_with(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(self.system.clone());
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Record a completed exchange and prune the oldest messages.
    pub fn record(&mut self, prompt: &str, reply: &str) {
        self.history.push(ChatMessage::user(prompt));
        self.history.push(ChatMessage::assistant(reply));

        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(..excess);
        }
    }
}

/// A text-in/text-out reasoning service with session affinity.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Open a new conversation.
    async fn open_session(&self) -> Result<Session, ServiceError>;

    /// Send a prompt within a conversation and return the reply text.
    ///
    /// The session is only updated when the call succeeds.
    async fn send(&self, session: &mut Session, prompt: &str) -> Result<String, ServiceError>;

    /// Model identifier, for report metadata.
    fn model_name(&self) -> &str;
}

/// Builds a reasoning service for one pipeline run.
pub trait ServiceConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn ReasoningService>, ServiceError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_messages_order() {
        let mut session = Session::new("sys", 10);
        session.record("q1", "a1");
        let messages = session.messages_with("q2");
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "q2");
    }

    #[test]
    fn test_session_prunes_oldest() {
        let mut session = Session::new("sys", 4);
        for i in 0..5 {
            session.record(&format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(session.history.len(), 4);
        let messages = session.messages_with("next");
        assert_eq!(messages[1].content, "q3");
        assert_eq!(messages[0].role, "system");
    }
}
