//! Pipeline configuration
//!
//! All tunables are fixed at construction time and shared read-only by every
//! stage of a run. A configuration can be loaded from a JSON file; any field
//! missing from the file keeps its default.

use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for lexical resolution, retrieval and generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum dictionary content length (in characters) before truncation
    pub truncate_limit: usize,
    /// Dictionary entries at least this long are compacted by the model
    pub summary_threshold: usize,
    /// Output budget for a dictionary summary
    pub summary_max_tokens: u32,
    /// Output budget for draft and revision calls
    pub max_tokens: u32,
    /// Sampling temperature passed through to the provider
    pub temperature: f32,
    /// Number of leading characters used for fuzzy prefix matching
    pub fuzzy_prefix_len: usize,
    /// Tokens must be strictly longer than this to be fuzzy matched
    pub fuzzy_min_len: usize,
    /// Maximum morphology records fetched per token
    pub morphology_limit: usize,
    /// Retrieved examples must score strictly above this
    pub similarity_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            truncate_limit: 2000,
            summary_threshold: 50,
            summary_max_tokens: 100,
            max_tokens: 512,
            temperature: 0.2,
            fuzzy_prefix_len: 5,
            fuzzy_min_len: 3,
            morphology_limit: 5,
            similarity_threshold: 0.1,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> AgentResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AgentError::Config(format!("Failed to parse config '{}': {}", path.display(), e))
        })
    }
}

/// Which evidence sources a run may consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Morphological analysis of source tokens
    pub grammar: bool,
    /// Lexicon lookup of lemmas (and surface forms)
    pub dictionary: bool,
    /// Mandatory terminology constraints
    pub glossary: bool,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            grammar: true,
            dictionary: true,
            glossary: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.truncate_limit, 2000);
        assert_eq!(config.summary_threshold, 50);
        assert_eq!(config.fuzzy_prefix_len, 5);
        assert_eq!(config.morphology_limit, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"truncate_limit": 300, "temperature": 0.0}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.truncate_limit, 300);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.summary_threshold, 50);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        match PipelineConfig::from_file(file.path()) {
            Err(AgentError::Config(msg)) => assert!(msg.contains("Failed to parse")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }
}
