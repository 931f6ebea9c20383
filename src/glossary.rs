//! Mandatory terminology matching
//!
//! Only literal surface words are matched: an inflected form is not reduced
//! to its glossary headword. Matching is exact up to case, never fuzzy.

use crate::error::AgentError;
use crate::store::GlossaryStore;
use crate::text::letter_runs;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Finds mandatory terminology in source text
///
/// # Example
///
/// ```ignore
/// let terms = GlossaryMatcher::new(&store).find_terms("Ātman is eternal");
/// assert_eq!(terms["ātman"], "the self");
/// ```
pub struct GlossaryMatcher<'a> {
    store: &'a dyn GlossaryStore,
}

impl<'a> GlossaryMatcher<'a> {
    /// Create a matcher over a glossary backend
    pub fn new(store: &'a dyn GlossaryStore) -> Self {
        Self { store }
    }

    /// Map each glossary term occurring in `text` to its definition.
    ///
    /// Keys are the terms as stored, not as written in `text`, so a
    /// capitalized occurrence reports the glossary's own spelling.
    ///
    /// Store problems never escape: a missing glossary table means "no
    /// terms", any other failure is logged and also yields an empty map.
    pub fn find_terms(&self, text: &str) -> BTreeMap<String, String> {
        let words: Vec<String> = letter_runs(text).into_iter().collect();
        if words.is_empty() {
            return BTreeMap::new();
        }

        match self.store.entries_for_terms(&words) {
            Ok(entries) => entries
                .into_iter()
                .map(|e| (e.term, e.definition.trim().to_string()))
                .collect(),
            Err(AgentError::StoreUnavailable(msg)) => {
                debug!("Glossary table unavailable, no terms applied: {}", msg);
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Glossary lookup failed: {}", e);
                BTreeMap::new()
            }
        }
    }
}

/// Render glossary hits as required literal translations
pub fn format_glossary_lines(terms: &BTreeMap<String, String>) -> String {
    terms
        .iter()
        .map(|(term, definition)| format!("- {}: {}", term, definition))
        .collect::<Vec<_>>()
        .join("\n")
}
