//! Generative model access
//!
//! The pipeline consumes a model only as "messages in, text out" through
//! [`TextGenerator`]. Two implementations ship with the crate:
//!
//! 1. [`ChatCompletionsProvider`] - any OpenAI-compatible chat completions server
//! 2. [`MockGenerator`] - deterministic replies for tests and offline runs
pub mod chat_completions;
pub mod generator;
pub mod mock;

pub use chat_completions::ChatCompletionsProvider;
pub use generator::{ChatMessage, GenerationRequest, Role, TextGenerator};
pub use mock::{MockGenerator, MockMode};
