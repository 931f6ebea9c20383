//! Example retrieval for style guidance
//!
//! Scores every eligible corpus item against the query with Jaccard
//! similarity over case-folded word sets and keeps the best `k`.
//!
//! An item is never eligible if it is the query item itself (same id), has
//! exactly the query's source text, or lies outside the allowed id range.
//! These exclusions keep evaluation free of test/reference leakage.

use crate::error::AgentResult;
use crate::partition::IdRange;
use crate::store::CorpusStore;
use crate::text::similarity_tokens;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Which datasets to search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetScope {
    All,
    Named(String),
}

impl DatasetScope {
    fn as_filter(&self) -> Option<&str> {
        match self {
            DatasetScope::All => None,
            DatasetScope::Named(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalQuery {
    pub text: String,
    pub scope: DatasetScope,
    pub exclude_id: Option<i64>,
    pub k: usize,
    pub allowed: IdRange,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>, scope: DatasetScope, k: usize) -> Self {
        Self {
            text: text.into(),
            scope,
            exclude_id: None,
            k,
            allowed: IdRange::unbounded(),
        }
    }

    pub fn excluding(mut self, item_id: i64) -> Self {
        self.exclude_id = Some(item_id);
        self
    }

    pub fn within(mut self, allowed: IdRange) -> Self {
        self.allowed = allowed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedExample {
    pub item_id: i64,
    pub source_text: String,
    pub target_text: String,
    pub similarity: f64,
}

/// Ranked examples, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub examples: Vec<RetrievedExample>,
}

impl RetrievalContext {
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// "Source: …\nTarget: …" blocks separated by blank lines, or `None`
    /// when nothing was retrieved
    pub fn render(&self) -> Option<String> {
        if self.examples.is_empty() {
            return None;
        }
        Some(
            self.examples
                .iter()
                .map(|ex| format_pair(&ex.source_text, &ex.target_text))
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}

/// One example pair, flattened onto single lines
pub fn format_pair(source: &str, target: &str) -> String {
    format!(
        "Source: {}\nTarget: {}",
        source.replace('\n', " ").trim(),
        target.replace('\n', " ").trim()
    )
}

/// |A ∩ B| / |A ∪ B|; 0 when both sets are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

pub struct RetrievalContextBuilder<'a> {
    store: &'a dyn CorpusStore,
    threshold: f64,
}

impl<'a> RetrievalContextBuilder<'a> {
    pub fn new(store: &'a dyn CorpusStore, threshold: f64) -> Self {
        Self { store, threshold }
    }

    /// Top-k eligible examples scoring strictly above the threshold.
    /// Equal scores are ordered by ascending item id.
    pub fn retrieve(&self, query: &RetrievalQuery) -> AgentResult<RetrievalContext> {
        if query.k == 0 {
            return Ok(RetrievalContext::default());
        }

        let query_tokens = similarity_tokens(&query.text);
        let mut scored: Vec<RetrievedExample> = self
            .store
            .corpus_items(query.scope.as_filter())?
            .into_iter()
            .filter(|item| Some(item.item_id) != query.exclude_id)
            .filter(|item| item.source_text != query.text)
            .filter(|item| query.allowed.contains(item.item_id))
            .map(|item| RetrievedExample {
                similarity: jaccard(&query_tokens, &similarity_tokens(&item.source_text)),
                item_id: item.item_id,
                source_text: item.source_text,
                target_text: item.target_text,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        scored.truncate(query.k);
        scored.retain(|ex| ex.similarity > self.threshold);

        Ok(RetrievalContext { examples: scored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CorpusItem, SqliteStore};

    fn corpus(dataset: &str, sources: &[&str]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let items: Vec<CorpusItem> = sources
            .iter()
            .enumerate()
            .map(|(i, src)| CorpusItem {
                dataset_name: dataset.to_string(),
                item_id: i as i64 + 1,
                source_text: src.to_string(),
                target_text: format!("target {}", i + 1),
            })
            .collect();
        store.replace_dataset(dataset, &items).unwrap();
        store
    }

    #[test]
    fn test_jaccard() {
        let a = similarity_tokens("rāmo vanaṃ gacchati");
        let b = similarity_tokens("rāmo gṛhaṃ gacchati");
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn test_ranked_descending_and_bounded() {
        let store = corpus(
            "mkb",
            &[
                "rāmo vanaṃ gacchati",
                "rāmo gṛhaṃ gacchati",
                "sītā vanaṃ gacchati",
                "rāmo vanaṃ gacchati sītayā saha",
                "unrelated words entirely",
            ],
        );
        let builder = RetrievalContextBuilder::new(&store, 0.1);
        let query = RetrievalQuery::new("rāmo vanaṃ gacchati", DatasetScope::All, 2);
        let context = builder.retrieve(&query).unwrap();

        assert_eq!(context.examples.len(), 2);
        assert!(context.examples[0].similarity >= context.examples[1].similarity);
        assert!(context.examples.iter().all(|ex| ex.similarity > 0.1));
        // Verbatim duplicate of the query is never returned
        assert!(context.examples.iter().all(|ex| ex.source_text != query.text));
    }

    #[test]
    fn test_excludes_self_and_respects_range() {
        let store = corpus(
            "mkb",
            &["a b c", "a b c d", "a b c e", "a b c f", "a b c g", "a b c h"],
        );
        let builder = RetrievalContextBuilder::new(&store, 0.1);
        let query = RetrievalQuery::new("a b c x", DatasetScope::Named("mkb".to_string()), 10)
            .excluding(4)
            .within(IdRange::new(3, 5));
        let context = builder.retrieve(&query).unwrap();

        let ids: Vec<i64> = context.examples.iter().map(|ex| ex.item_id).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn test_equal_scores_break_by_id() {
        let store = corpus("mkb", &["x y", "x z", "x w"]);
        let builder = RetrievalContextBuilder::new(&store, 0.1);
        let context = builder
            .retrieve(&RetrievalQuery::new("x q", DatasetScope::All, 3))
            .unwrap();
        let ids: Vec<i64> = context.examples.iter().map(|ex| ex.item_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_threshold_and_empty_render() {
        let store = corpus("mkb", &["one two three four five six seven eight nine ten"]);
        let builder = RetrievalContextBuilder::new(&store, 0.1);
        let context = builder
            .retrieve(&RetrievalQuery::new("one", DatasetScope::All, 3))
            .unwrap();
        // 1/10 is not strictly above the threshold
        assert!(context.is_empty());
        assert_eq!(context.render(), None);
    }

    #[test]
    fn test_scope_filters_dataset() {
        let store = corpus("mkb", &["a b"]);
        store
            .replace_dataset(
                "other",
                &[CorpusItem {
                    dataset_name: "other".to_string(),
                    item_id: 1,
                    source_text: "a b c".to_string(),
                    target_text: "t".to_string(),
                }],
            )
            .unwrap();
        let builder = RetrievalContextBuilder::new(&store, 0.1);
        let context = builder
            .retrieve(&RetrievalQuery::new("a b c d", DatasetScope::Named("mkb".to_string()), 5))
            .unwrap();
        assert_eq!(context.examples.len(), 1);
        assert_eq!(context.examples[0].source_text, "a b");
    }

    #[test]
    fn test_render_flattens_newlines() {
        let context = RetrievalContext {
            examples: vec![
                RetrievedExample {
                    item_id: 1,
                    source_text: "line one\nline two".to_string(),
                    target_text: " first ".to_string(),
                    similarity: 0.5,
                },
                RetrievedExample {
                    item_id: 2,
                    source_text: "s".to_string(),
                    target_text: "t".to_string(),
                    similarity: 0.4,
                },
            ],
        };
        assert_eq!(
            context.render().unwrap(),
            "Source: line one line two\nTarget: first\n\nSource: s\nTarget: t"
        );
    }
}
