//! Evidence-guided Sanskrit to English translation
//!
//! A generative model drafts a translation; deterministic evidence
//! (attested morphology, dictionary entries, mandatory terminology) is then
//! gathered for the source words and fed back for a revision pass. Example
//! pairs retrieved from a parallel corpus can steer the style of the draft.
//!
//! The main entry point is [`TranslationPipeline`]. Evaluation over a
//! parallel dataset, with reproducible partitioning, lives in [`eval`].

pub mod config;
pub mod error;
pub mod eval;
pub mod evidence;
pub mod glossary;
pub mod ingest;
pub mod lemma;
pub mod lexicon;
pub mod llm;
pub mod metrics;
pub mod morphology;
pub mod partition;
pub mod pipeline;
pub mod prompts;
pub mod retrieval;
pub mod store;
pub mod text;
pub mod transliterate;

pub use config::{Capabilities, PipelineConfig};
pub use error::{AgentError, AgentResult};
pub use eval::{EvalMode, EvaluationConfig, EvaluationReport, EvaluationRunner};
pub use evidence::{EvidenceAggregator, EvidenceBundle};
pub use glossary::GlossaryMatcher;
pub use lemma::LemmaCandidateGenerator;
pub use lexicon::{LexiconResolver, Resolution};
pub use llm::{ChatCompletionsProvider, MockGenerator, MockMode, TextGenerator};
pub use morphology::{MorphAnalysis, MorphologyResolver};
pub use partition::{PartitionPlan, PartitionPlanner, PoolStrategy, Selection};
pub use pipeline::{FewShot, PipelineState, Stage, TranslationPipeline, TranslationRequest};
pub use retrieval::{RetrievalContext, RetrievalContextBuilder, RetrievalQuery};
pub use store::{KnowledgeStore, SqliteStore};
pub use transliterate::{DevanagariToIast, Transliterator};
