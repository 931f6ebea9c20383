//! Generative model trait and request types
//!
//! The pipeline only needs "messages in, text out". Providers implement
//! [`TextGenerator`]; a failed call is an `Err`, never an error message
//! dressed up as model output.
//!
//! # Example
//!
//! ```ignore
//! use anuvada::llm::{ChatMessage, GenerationRequest, MockGenerator, MockMode, TextGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = MockGenerator::new(MockMode::Fixed("The king rules.".to_string()));
//!     let request = GenerationRequest::new(vec![
//!         ChatMessage::system("You are a translator."),
//!         ChatMessage::user("rājā śāsti"),
//!     ]);
//!     println!("{}", generator.generate(&request).await?);
//!     Ok(())
//! }
//! ```

use crate::error::AgentResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One generation call: ordered messages plus optional sampling limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Content of the system message, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message, if any
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Generic trait for generative text providers
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a completion for the request
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The generated text
    /// * `Err(AgentError::Generation | AgentError::Network | AgentError::Config)` - On failure
    async fn generate(&self, request: &GenerationRequest) -> AgentResult<String>;

    /// Name used in logs
    fn provider_name(&self) -> &str;
}
