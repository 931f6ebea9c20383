//! OpenAI-compatible chat completions provider
//!
//! Works with any server exposing `POST {base_url}/chat/completions`,
//! including a local llama.cpp server hosting an instruct model.
//!
//! # Configuration
//!
//! `from_env` reads:
//! - `ANUVADA_LLM_BASE_URL` (default `http://127.0.0.1:8080/v1`)
//! - `ANUVADA_LLM_MODEL` (default `qwen2.5-7b-instruct`)
//! - `ANUVADA_LLM_API_KEY` (optional bearer token)

use crate::error::{AgentError, AgentResult};
use crate::llm::generator::{GenerationRequest, TextGenerator};
use async_trait::async_trait;
use serde_json::json;

/// HTTP text generator for `/chat/completions` endpoints
///
/// The API key, when present, is sent as a bearer token and masked in
/// `Debug` output.
#[derive(Clone)]
pub struct ChatCompletionsProvider {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:8080/v1";
    pub const DEFAULT_MODEL: &'static str = "qwen2.5-7b-instruct";
    /// Used when a request does not set its own budget
    const DEFAULT_MAX_TOKENS: u32 = 512;
    const DEFAULT_TEMPERATURE: f32 = 0.2;
    const TOP_P: f32 = 0.9;

    /// Create a provider for an explicit endpoint
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server root including the API version, e.g. `http://127.0.0.1:8080/v1`.
    ///   A trailing slash is ignored.
    /// * `model` - Model name sent with every request
    /// * `api_key` - Optional bearer token; blank keys are treated as absent
    ///
    /// # Returns
    ///
    /// `AgentError::Config` for an empty base URL or model name, or
    /// `AgentError::Network` if the HTTP client cannot be built.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let provider = ChatCompletionsProvider::new("http://127.0.0.1:8080/v1", "qwen2.5-7b-instruct", None)?;
    /// ```
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> AgentResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AgentError::Config("Base URL cannot be empty".to_string()));
        }
        let model = model.into();
        if model.trim().is_empty() {
            return Err(AgentError::Config("Model name cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| AgentError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            model,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    /// Create a provider from `ANUVADA_LLM_*` environment variables
    ///
    /// Unset variables fall back to the defaults listed in the module docs.
    pub fn from_env() -> AgentResult<Self> {
        let base_url = std::env::var("ANUVADA_LLM_BASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("ANUVADA_LLM_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string());
        let api_key = std::env::var("ANUVADA_LLM_API_KEY").ok();
        Self::new(base_url, model, api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// JSON body: the request's messages plus sampling parameters, non-streaming
    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS),
            "temperature": request.temperature.unwrap_or(Self::DEFAULT_TEMPERATURE),
            "top_p": Self::TOP_P,
            "stream": false
        })
    }
}

/// Pull `choices[0].message.content` out of a completion response
fn extract_content(body: &serde_json::Value) -> AgentResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            AgentError::Generation(
                "Invalid response: missing 'choices[0].message.content'".to_string(),
            )
        })
}

impl std::fmt::Debug for ChatCompletionsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsProvider {
    /// Send one completion request
    ///
    /// Error mapping:
    /// - transport failures become `AgentError::Network`
    /// - a rejection mentioning the context window or tokens becomes `AgentError::Generation`
    /// - other 4xx responses become `AgentError::Config`
    /// - 5xx responses and malformed bodies become `AgentError::Generation`
    async fn generate(&self, request: &GenerationRequest) -> AgentResult<String> {
        if request.messages.is_empty() {
            return Err(AgentError::Generation("Request has no messages".to_string()));
        }

        let mut http = self.client.post(self.endpoint()).json(&self.request_body(request));
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }
        let response = http.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let lowered = error_text.to_lowercase();
            return Err(if lowered.contains("context") || lowered.contains("token") {
                AgentError::Generation(format!(
                    "Input too long for the model context window ({}): {}",
                    status, error_text
                ))
            } else if status.is_client_error() {
                AgentError::Config(format!("API client error ({}): {}", status, error_text))
            } else {
                AgentError::Generation(format!("API server error ({}): {}", status, error_text))
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Generation(format!("Failed to parse API response: {}", e)))?;
        extract_content(&body)
    }

    fn provider_name(&self) -> &str {
        "Chat Completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::generator::ChatMessage;

    #[test]
    fn test_new_rejects_empty_fields() {
        assert!(matches!(
            ChatCompletionsProvider::new("", "m", None),
            Err(AgentError::Config(_))
        ));
        assert!(matches!(
            ChatCompletionsProvider::new("http://localhost/v1", "  ", None),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let provider = ChatCompletionsProvider::new("http://localhost:8080/v1/", "m", None).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_body_defaults_and_overrides() {
        let provider = ChatCompletionsProvider::new("http://x/v1", "qwen", None).unwrap();
        let request = GenerationRequest::new(vec![ChatMessage::user("hi")]);
        let body = provider.request_body(&request);
        assert_eq!(body["model"], "qwen");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "user");

        let body = provider.request_body(&request.with_max_tokens(100));
        assert_eq!(body["max_tokens"], 100);
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "The king"}}]});
        assert_eq!(extract_content(&ok).unwrap(), "The king");

        let bad = json!({"error": "nope"});
        assert!(matches!(extract_content(&bad), Err(AgentError::Generation(_))));
    }

    #[test]
    fn test_debug_masks_key() {
        let provider =
            ChatCompletionsProvider::new("http://x/v1", "m", Some("secret-key".to_string())).unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("***"));
        assert!(!debug_str.contains("secret-key"));
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let provider = ChatCompletionsProvider::new("http://x/v1", "m", None).unwrap();
        let result = provider.generate(&GenerationRequest::new(vec![])).await;
        assert!(matches!(result, Err(AgentError::Generation(_))));
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored (needs a running server)
    async fn test_real_server_generation() {
        let provider = ChatCompletionsProvider::from_env().unwrap();
        let request = GenerationRequest::new(vec![ChatMessage::user("Say hello.")]);
        let result = provider.generate(&request).await.unwrap();
        assert!(!result.is_empty());
    }
}
