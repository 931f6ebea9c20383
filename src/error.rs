/// Error types for the translation pipeline and its collaborators
///
/// Absence of data (no lexicon entry, no morphology record, no glossary hit) is
/// normally not an error at all: resolvers report it with typed "not found"
/// values. The variants below cover the cases a caller has to tell apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// A lookup found nothing where the caller required a value
    NotFound(String),
    /// An expected store table is missing
    StoreUnavailable(String),
    /// Any other store failure (schema mismatch, corruption, lock errors)
    Store(String),
    /// The generative model failed to produce text
    Generation(String),
    /// Transport failure while talking to a remote provider
    Network(String),
    /// Invalid or missing configuration
    Config(String),
    /// The run record could not be written
    Persistence(String),
    /// Reading or parsing ingest input failed
    Ingest(String),
    /// General error with context
    Other(String),
}

impl AgentError {
    /// True for the "table missing" case, which callers usually treat as "no data"
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AgentError::StoreUnavailable(_))
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AgentError::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            AgentError::Store(msg) => write!(f, "Store error: {}", msg),
            AgentError::Generation(msg) => write!(f, "Generation failed: {}", msg),
            AgentError::Network(msg) => write!(f, "Network error: {}", msg),
            AgentError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AgentError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            AgentError::Ingest(msg) => write!(f, "Ingest error: {}", msg),
            AgentError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<rusqlite::Error> for AgentError {
    fn from(err: rusqlite::Error) -> Self {
        let msg = err.to_string();
        if msg.contains("no such table") {
            AgentError::StoreUnavailable(msg)
        } else {
            AgentError::Store(msg)
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Network(err.to_string())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Ingest(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Ingest(err.to_string())
    }
}

/// Result type for pipeline operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_is_unavailable() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: AgentError = conn
            .prepare("SELECT term FROM glossary")
            .map(|_| ())
            .unwrap_err()
            .into();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_syntax_error_is_store_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: AgentError = conn.prepare("SELEC nothing").map(|_| ()).unwrap_err().into();
        assert!(matches!(err, AgentError::Store(_)));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            AgentError::Generation("timeout".to_string()).to_string(),
            "Generation failed: timeout"
        );
        assert_eq!(AgentError::Other("plain".to_string()).to_string(), "plain");
    }
}
