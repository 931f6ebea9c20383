//! Store interface consumed by the pipeline
//!
//! The core never talks to a database directly. Each table it reads or writes
//! is described by a small trait; [`SqliteStore`] implements all of them and
//! tests are free to substitute their own.

pub mod sqlite;

use crate::error::AgentResult;
use serde::{Deserialize, Serialize};

pub use sqlite::SqliteStore;

/// A dictionary entry; read-only to the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub lemma: String,
    pub gloss: Option<String>,
    pub raw_markup: Option<String>,
    pub source_tag: String,
}

/// One attested (word, lemma, tag) analysis from the morphology corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphRecord {
    pub word: String,
    pub lemma: String,
    pub tag: String,
    pub sentence_id: String,
}

/// Mandatory terminology entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
    pub source: Option<String>,
    pub page: Option<i64>,
}

/// A parallel (source, target) example
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusItem {
    pub dataset_name: String,
    pub item_id: i64,
    pub source_text: String,
    pub target_text: String,
}

/// Persisted summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: String,
    pub mode_label: String,
    pub source_text: String,
    pub final_text: String,
    pub evidence_json: String,
    pub trace_json: String,
}

pub trait LexiconStore: Send + Sync {
    /// Every entry whose lemma is exactly one of `lemmas`
    fn entries_with_lemma_in(&self, lemmas: &[String]) -> AgentResult<Vec<LexiconEntry>>;

    /// First entry (in store order) whose lemma starts with `prefix`, ignoring case
    fn first_entry_with_prefix(&self, prefix: &str) -> AgentResult<Option<LexiconEntry>>;
}

pub trait MorphologyStore: Send + Sync {
    /// Records whose word equals `word` exactly or case-insensitively, at most `limit`
    fn analyses_of(&self, word: &str, limit: usize) -> AgentResult<Vec<MorphRecord>>;
}

pub trait GlossaryStore: Send + Sync {
    /// Entries whose term case-insensitively equals one of `terms`
    fn entries_for_terms(&self, terms: &[String]) -> AgentResult<Vec<GlossaryEntry>>;
}

pub trait CorpusStore: Send + Sync {
    /// Items of one dataset (or all datasets), ordered by dataset then item id
    fn corpus_items(&self, dataset: Option<&str>) -> AgentResult<Vec<CorpusItem>>;

    /// Distinct dataset names, sorted
    fn dataset_names(&self) -> AgentResult<Vec<String>>;
}

pub trait RunLogStore: Send + Sync {
    fn record_run(&self, record: &RunRecord) -> AgentResult<()>;
}

/// Everything the pipeline and the evaluation runner need from a store
pub trait KnowledgeStore:
    LexiconStore + MorphologyStore + GlossaryStore + CorpusStore + RunLogStore
{
}

impl<T> KnowledgeStore for T where
    T: LexiconStore + MorphologyStore + GlossaryStore + CorpusStore + RunLogStore
{
}
