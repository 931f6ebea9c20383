//! Evidence aggregation for the revision pass
//!
//! Morphology, dictionary and glossary findings are collected into an
//! [`EvidenceBundle`]. Long dictionary entries can be compacted by the
//! generator first; each entry is summarized on its own, so a failed call
//! leaves that entry raw and the others unaffected.

use crate::error::{AgentError, AgentResult};
use crate::llm::{ChatMessage, GenerationRequest, TextGenerator};
use crate::prompts::{DICT_SUMMARY_SYSTEM, summary_user};
use crate::text::clean_response;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const MORPHOLOGY_HEADER: &str = "--- Morphological Analysis ---";
const DICTIONARY_HEADER: &str = "--- Dictionary Definitions ---";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Surface token -> "Lemma: X | Tags: Y"
    pub morphology: BTreeMap<String, String>,
    /// Lookup term -> (possibly summarized) dictionary entry
    pub dictionary_summary: BTreeMap<String, String>,
    /// Glossary term -> mandated translation
    pub glossary: BTreeMap<String, String>,
}

impl EvidenceBundle {
    /// Record the best analysis of a token
    pub fn add_morphology(&mut self, token: &str, lemma: &str, tags: &str) {
        self.morphology
            .insert(token.to_string(), format!("Lemma: {} | Tags: {}", lemma, tags));
    }

    /// Combined evidence block for revision; empty when there is no
    /// morphology or dictionary evidence. The glossary travels separately.
    pub fn evidence_text(&self) -> String {
        let mut sections = Vec::new();

        if !self.morphology.is_empty() {
            let mut lines = vec![MORPHOLOGY_HEADER.to_string()];
            lines.extend(
                self.morphology
                    .iter()
                    .map(|(token, info)| format!("Token '{}': {}", token, info)),
            );
            sections.push(lines.join("\n"));
        }

        if !self.dictionary_summary.is_empty() {
            let mut lines = vec![DICTIONARY_HEADER.to_string()];
            lines.extend(
                self.dictionary_summary
                    .iter()
                    .map(|(term, summary)| format!("Term '{}':\n{}", term, summary)),
            );
            sections.push(lines.join("\n"));
        }

        sections.join("\n\n")
    }
}

/// Result of compacting a batch of dictionary entries
#[derive(Debug, Default)]
pub struct Compaction {
    pub entries: BTreeMap<String, String>,
    /// Number of entries sent to the generator successfully
    pub summarized: usize,
    /// Entries whose summary call failed; their raw content was kept
    pub failures: BTreeMap<String, AgentError>,
}

pub struct EvidenceAggregator<'a> {
    generator: &'a dyn TextGenerator,
    threshold: usize,
    max_tokens: u32,
}

impl<'a> EvidenceAggregator<'a> {
    pub fn new(generator: &'a dyn TextGenerator, threshold: usize, max_tokens: u32) -> Self {
        Self {
            generator,
            threshold,
            max_tokens,
        }
    }

    /// Summarize every entry at least `threshold` characters long.
    /// Shorter entries pass through unchanged.
    pub async fn compact(&self, entries: BTreeMap<String, String>) -> Compaction {
        let mut out = Compaction::default();

        for (word, raw) in entries {
            if raw.chars().count() < self.threshold {
                out.entries.insert(word, raw);
                continue;
            }

            match self.summarize(&word, &raw).await {
                Ok(summary) => {
                    out.summarized += 1;
                    out.entries.insert(word, summary);
                }
                Err(e) => {
                    warn!("Summary failed for '{}', keeping raw entry: {}", word, e);
                    out.failures.insert(word.clone(), e);
                    out.entries.insert(word, raw);
                }
            }
        }

        out
    }

    async fn summarize(&self, word: &str, raw: &str) -> AgentResult<String> {
        let request = GenerationRequest::new(vec![
            ChatMessage::system(DICT_SUMMARY_SYSTEM),
            ChatMessage::user(summary_user(word, raw)),
        ])
        .with_max_tokens(self.max_tokens);

        let summary = clean_response(&self.generator.generate(&request).await?);
        if summary.is_empty() {
            return Err(AgentError::Generation(format!(
                "empty summary for '{}'",
                word
            )));
        }
        debug!("Summarized '{}' ({} chars)", word, summary.chars().count());
        Ok(summary)
    }
}
