//! Mock generator for testing
//!
//! Deterministic and API-free. Every request is recorded so tests can assert
//! how many calls a run made and what was sent.
//!
//! # Example
//!
//! ```ignore
//! let mock = MockGenerator::new(MockMode::Fixed("the king rules".to_string()));
//! let out = mock.generate(&request).await.unwrap();
//! assert_eq!(out, "the king rules");
//! assert_eq!(mock.call_count(), 1);
//! ```

use crate::error::{AgentError, AgentResult};
use crate::llm::generator::{GenerationRequest, TextGenerator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock generation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Always return the same text
    Fixed(String),

    /// Return the scripted replies in order; fail once they run out
    Script(Vec<String>),

    /// Return the last user message unchanged
    Echo,

    /// Fail when the system prompt contains the marker, otherwise reply with the text
    FailWhen { marker: String, reply: String },

    /// Simulate provider errors
    Error(String),
}

#[derive(Debug)]
pub struct MockGenerator {
    mode: MockMode,
    script: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new(mode: MockMode) -> Self {
        let script = match &mode {
            MockMode::Script(replies) => replies.iter().cloned().collect(),
            _ => VecDeque::new(),
        };
        Self {
            mode,
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn reply(&self, request: &GenerationRequest) -> AgentResult<String> {
        match &self.mode {
            MockMode::Fixed(text) => Ok(text.clone()),
            MockMode::Script(_) => self
                .script
                .lock()
                .map_err(|_| AgentError::Generation("mock script lock poisoned".to_string()))?
                .pop_front()
                .ok_or_else(|| AgentError::Generation("mock script exhausted".to_string())),
            MockMode::Echo => Ok(request.user_prompt().unwrap_or_default().to_string()),
            MockMode::FailWhen { marker, reply } => {
                if request
                    .system_prompt()
                    .is_some_and(|prompt| prompt.contains(marker.as_str()))
                {
                    Err(AgentError::Generation(format!("mock failure on '{}'", marker)))
                } else {
                    Ok(reply.clone())
                }
            }
            MockMode::Error(msg) => Err(AgentError::Generation(msg.clone())),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> AgentResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.reply(request)
    }

    fn provider_name(&self) -> &str {
        "Mock Generator"
    }
}
