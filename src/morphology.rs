//! Attested morphology lookup
//!
//! Maps a surface token to the (lemma, tag) pairs recorded for it in the
//! morphology corpus. The store may hold many duplicate records for a frequent
//! word; only distinct pairs are kept, in store order.

use crate::error::AgentResult;
use crate::store::MorphologyStore;
use serde::{Deserialize, Serialize};

/// A distinct (lemma, tags) reading of a token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Analysis {
    pub lemma: String,
    pub tags: String,
}

/// Result of analysing one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphAnalysis {
    pub word: String,
    pub analyses: Vec<Analysis>,
}

impl MorphAnalysis {
    /// True if at least one reading was attested
    pub fn found(&self) -> bool {
        !self.analyses.is_empty()
    }

    /// The designated reading: the first one the store returned
    pub fn best(&self) -> Option<&Analysis> {
        self.analyses.first()
    }
}

/// Looks up attested readings of surface tokens
///
/// # Example
///
/// ```ignore
/// let resolver = MorphologyResolver::new(&store, 5);
/// let analysis = resolver.analyze("gacchati")?;
/// assert_eq!(analysis.best().unwrap().lemma, "gam");
/// ```
pub struct MorphologyResolver<'a> {
    store: &'a dyn MorphologyStore,
    limit: usize,
}

impl<'a> MorphologyResolver<'a> {
    /// Create a resolver
    ///
    /// # Arguments
    ///
    /// * `store` - Morphology backend
    /// * `limit` - Maximum records read per token, applied before duplicate
    ///   readings are collapsed
    pub fn new(store: &'a dyn MorphologyStore, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Analyse one token
    ///
    /// Records spelled exactly like `word` come first, then those equal to it
    /// up to Unicode case. A miss is an empty analysis, not an error.
    ///
    /// # Returns
    ///
    /// The distinct (lemma, tags) readings in store order, or the store's
    /// error.
    pub fn analyze(&self, word: &str) -> AgentResult<MorphAnalysis> {
        let word = word.trim();
        let mut analysis = MorphAnalysis {
            word: word.to_string(),
            analyses: Vec::new(),
        };
        if word.is_empty() {
            return Ok(analysis);
        }

        for record in self.store.analyses_of(word, self.limit)? {
            let reading = Analysis {
                lemma: record.lemma,
                tags: record.tag,
            };
            if !analysis.analyses.contains(&reading) {
                analysis.analyses.push(reading);
            }
        }

        Ok(analysis)
    }
}
