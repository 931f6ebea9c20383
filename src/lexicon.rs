//! Dictionary resolution for surface tokens and lemmas
//!
//! For each token:
//! 1. Devanagari input is romanized to IAST
//! 2. Lemma candidates are generated from suffix rewrites
//! 3. Exact match over all candidates; the shortest lemma wins, ties broken
//!    by lexical order of the lemma
//! 4. Otherwise, for tokens longer than the fuzzy minimum, the first entry
//!    whose lemma starts with the token's leading characters
//!
//! Every token is resolved independently. A store failure for one token is
//! recorded and the batch continues.

use crate::config::PipelineConfig;
use crate::error::{AgentError, AgentResult};
use crate::lemma::LemmaCandidateGenerator;
use crate::store::{LexiconEntry, LexiconStore};
use crate::text::{contains_devanagari, truncate_chars};
use crate::transliterate::Transliterator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Sentinel rendered for a token with no dictionary entry
pub const NOT_FOUND: &str = "No entry found";

/// Content used when an entry has neither gloss nor markup
pub const EMPTY_ENTRY: &str = "Entry found but empty.";

/// Prefix rendered for a token whose lookup raised a store error
pub const LOOKUP_FAILED: &str = "Lookup failed";

/// How a lemma was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Prefix,
}

/// Outcome of resolving a single token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Matched {
        lemma: String,
        kind: MatchKind,
        content: String,
    },
    NotFound,
}

impl Resolution {
    /// True for [`Resolution::Matched`]
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Matched { .. })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Matched { lemma, content, .. } => {
                write!(f, "[Matched Lemma: {}]\n{}", lemma, content)
            }
            Resolution::NotFound => f.write_str(NOT_FOUND),
        }
    }
}

/// Per-token results of a batch lookup
///
/// Every distinct non-empty token lands in exactly one of the two maps:
/// `resolved` when the store answered (match or [`Resolution::NotFound`]),
/// `failures` when it raised an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexiconLookup {
    pub resolved: BTreeMap<String, Resolution>,
    /// Tokens whose lookup failed, with the error
    pub failures: BTreeMap<String, AgentError>,
}

impl LexiconLookup {
    /// Rendered entries, one string per token
    ///
    /// Unmatched tokens render as [`NOT_FOUND`]; tokens whose lookup failed
    /// render as `"Lookup failed: <error>"`, so no token is dropped.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let lookup = resolver.resolve(&["dharmasya", "xyzzy"]);
    /// let rendered = lookup.rendered();
    /// assert!(rendered["dharmasya"].starts_with("[Matched Lemma: dharma]"));
    /// assert_eq!(rendered["xyzzy"], NOT_FOUND);
    /// ```
    pub fn rendered(&self) -> BTreeMap<String, String> {
        let mut rendered: BTreeMap<String, String> = self
            .resolved
            .iter()
            .map(|(token, res)| (token.clone(), res.to_string()))
            .collect();
        for (token, err) in &self.failures {
            rendered.insert(token.clone(), format!("{}: {}", LOOKUP_FAILED, err));
        }
        rendered
    }

    /// Rendered entries for tokens that actually matched
    ///
    /// This is what the pipeline feeds into summarization: sentinels and
    /// failures carry no evidence.
    pub fn found(&self) -> BTreeMap<String, String> {
        self.resolved
            .iter()
            .filter(|(_, res)| res.is_found())
            .map(|(token, res)| (token.clone(), res.to_string()))
            .collect()
    }
}

/// Resolves surface tokens (IAST or Devanagari) to dictionary entries
///
/// Borrowed collaborators only; a resolver is cheap to build per request.
pub struct LexiconResolver<'a> {
    store: &'a dyn LexiconStore,
    transliterator: &'a dyn Transliterator,
    generator: LemmaCandidateGenerator,
    truncate_limit: usize,
    fuzzy_prefix_len: usize,
    fuzzy_min_len: usize,
}

impl<'a> LexiconResolver<'a> {
    /// Create a resolver with the default suffix rules
    ///
    /// # Arguments
    ///
    /// * `store` - Dictionary backend
    /// * `transliterator` - Romanizes Devanagari tokens before lookup
    /// * `config` - Supplies the truncation limit and fuzzy-match settings
    pub fn new(
        store: &'a dyn LexiconStore,
        transliterator: &'a dyn Transliterator,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            transliterator,
            generator: LemmaCandidateGenerator::default(),
            truncate_limit: config.truncate_limit,
            fuzzy_prefix_len: config.fuzzy_prefix_len,
            fuzzy_min_len: config.fuzzy_min_len,
        }
    }

    /// Swap in a custom lemma candidate generator
    pub fn with_generator(mut self, generator: LemmaCandidateGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Resolve every distinct non-empty token (after trimming)
    ///
    /// A store error for one token is logged and recorded in
    /// [`LexiconLookup::failures`]; the remaining tokens are still resolved.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> LexiconLookup {
        let unique: BTreeSet<&str> = tokens
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();

        let mut lookup = LexiconLookup::default();
        for token in unique {
            match self.resolve_one(token) {
                Ok(resolution) => {
                    lookup.resolved.insert(token.to_string(), resolution);
                }
                Err(e) => {
                    warn!("Dictionary lookup failed for '{}': {}", token, e);
                    lookup.failures.insert(token.to_string(), e);
                }
            }
        }
        lookup
    }

    /// Resolve a single token
    ///
    /// # Returns
    ///
    /// * `Ok(Resolution::Matched)` - exact candidate hit, or prefix hit for
    ///   tokens longer than the fuzzy minimum
    /// * `Ok(Resolution::NotFound)` - the store has nothing for the token
    /// * `Err(_)` - the store itself failed
    pub fn resolve_one(&self, token: &str) -> AgentResult<Resolution> {
        let form = if contains_devanagari(token) {
            self.transliterator.transliterate(token)
        } else {
            token.to_string()
        };

        let candidates: Vec<String> = self.generator.candidates(&form).into_iter().collect();
        let exact = self.store.entries_with_lemma_in(&candidates)?;

        let (entry, kind) = match pick_shortest(exact) {
            Some(entry) => (entry, MatchKind::Exact),
            None if form.chars().count() > self.fuzzy_min_len => {
                let prefix: String = form.chars().take(self.fuzzy_prefix_len).collect();
                match self.store.first_entry_with_prefix(&prefix)? {
                    Some(entry) => (entry, MatchKind::Prefix),
                    None => return Ok(Resolution::NotFound),
                }
            }
            None => return Ok(Resolution::NotFound),
        };

        debug!("'{}' resolved to lemma '{}' ({:?})", token, entry.lemma, kind);
        Ok(Resolution::Matched {
            content: truncate_chars(&entry_content(&entry), self.truncate_limit),
            lemma: entry.lemma,
            kind,
        })
    }
}

/// Shortest lemma (in characters) first, then lexical order
fn pick_shortest(entries: Vec<LexiconEntry>) -> Option<LexiconEntry> {
    entries.into_iter().min_by(|a, b| {
        a.lemma
            .chars()
            .count()
            .cmp(&b.lemma.chars().count())
            .then_with(|| a.lemma.cmp(&b.lemma))
    })
}

fn entry_content(entry: &LexiconEntry) -> String {
    [&entry.gloss, &entry.raw_markup]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| EMPTY_ENTRY.to_string())
}
