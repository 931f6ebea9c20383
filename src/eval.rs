//! Ablation runs over a parallel dataset
//!
//! Nine configurations (A to I) toggle the evidence switches, example
//! guidance and glossary. Every configuration goes through the same
//! [`PartitionPlanner`], so with the same dataset, split settings and seed
//! they are tested on the same items and retrieval never sees a test item.
//!
//! Items run one at a time, in selection order. A failed item is recorded
//! in the report and the batch moves on.

use crate::config::Capabilities;
use crate::error::{AgentError, AgentResult};
use crate::metrics::{corpus_chrf, sentence_chrf};
use crate::partition::{IdRange, PartitionPlanner, PoolStrategy, Selection};
use crate::pipeline::{ExampleSource, FewShot, TranslationPipeline, TranslationRequest};
use crate::retrieval::{DatasetScope, RetrievalQuery};
use crate::store::CorpusItem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Seed for static example draws when the test selection carries none
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalMode {
    /// A: draft only
    Baseline,
    /// B: dictionary evidence
    DictOnly,
    /// C: morphology evidence
    GrammarOnly,
    /// D: morphology and dictionary evidence
    FullAgent,
    /// E: full agent with one fixed example set
    StaticFewShot,
    /// F: full agent with per-item retrieved examples
    DynamicRetrieval,
    /// G: draft with mandatory terminology
    BaselineGlossary,
    /// H: full agent with mandatory terminology
    FullAgentGlossary,
    /// I: retrieval and mandatory terminology
    DynamicRetrievalGlossary,
}

impl EvalMode {
    pub const ALL: [EvalMode; 9] = [
        EvalMode::Baseline,
        EvalMode::DictOnly,
        EvalMode::GrammarOnly,
        EvalMode::FullAgent,
        EvalMode::StaticFewShot,
        EvalMode::DynamicRetrieval,
        EvalMode::BaselineGlossary,
        EvalMode::FullAgentGlossary,
        EvalMode::DynamicRetrievalGlossary,
    ];

    pub fn letter(self) -> char {
        match self {
            EvalMode::Baseline => 'A',
            EvalMode::DictOnly => 'B',
            EvalMode::GrammarOnly => 'C',
            EvalMode::FullAgent => 'D',
            EvalMode::StaticFewShot => 'E',
            EvalMode::DynamicRetrieval => 'F',
            EvalMode::BaselineGlossary => 'G',
            EvalMode::FullAgentGlossary => 'H',
            EvalMode::DynamicRetrievalGlossary => 'I',
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EvalMode::Baseline => "Baseline (no tools)",
            EvalMode::DictOnly => "Dictionary only",
            EvalMode::GrammarOnly => "Grammar only",
            EvalMode::FullAgent => "Full agent (dictionary + grammar)",
            EvalMode::StaticFewShot => "Static few-shot",
            EvalMode::DynamicRetrieval => "Dynamic top-k retrieval",
            EvalMode::BaselineGlossary => "Baseline + glossary",
            EvalMode::FullAgentGlossary => "Full agent + glossary",
            EvalMode::DynamicRetrievalGlossary => "Dynamic retrieval + glossary",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        let (grammar, dictionary, glossary) = match self {
            EvalMode::Baseline => (false, false, false),
            EvalMode::DictOnly => (false, true, false),
            EvalMode::GrammarOnly => (true, false, false),
            EvalMode::FullAgent | EvalMode::StaticFewShot | EvalMode::DynamicRetrieval => {
                (true, true, false)
            }
            EvalMode::BaselineGlossary => (false, false, true),
            EvalMode::FullAgentGlossary | EvalMode::DynamicRetrievalGlossary => (true, true, true),
        };
        Capabilities {
            grammar,
            dictionary,
            glossary,
        }
    }

    pub fn examples(self) -> Option<ExampleSource> {
        match self {
            EvalMode::StaticFewShot => Some(ExampleSource::Static),
            EvalMode::DynamicRetrieval | EvalMode::DynamicRetrievalGlossary => {
                Some(ExampleSource::Retrieved)
            }
            _ => None,
        }
    }
}

impl fmt::Display for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.letter(), self.description())
    }
}

impl FromStr for EvalMode {
    type Err = AgentError;

    /// Accepts the mode letter, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let letter = s.trim().to_ascii_uppercase();
        EvalMode::ALL
            .into_iter()
            .find(|mode| letter.len() == 1 && letter.starts_with(mode.letter()))
            .ok_or_else(|| AgentError::Config(format!("Unknown evaluation mode '{}' (expected A-I)", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub dataset: String,
    pub mode: EvalMode,
    pub selection: Selection,
    /// Only consulted by modes that use examples
    pub strategy: PoolStrategy,
    /// Test only the first half even without examples, for comparability
    pub restrict_pool_to_half: bool,
    /// Examples per item (k) or size of the static set
    pub num_examples: usize,
}

impl EvaluationConfig {
    pub fn new(dataset: impl Into<String>, mode: EvalMode) -> Self {
        Self {
            dataset: dataset.into(),
            mode,
            selection: Selection::FirstN(5),
            strategy: PoolStrategy::Global,
            restrict_pool_to_half: false,
            num_examples: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_id: i64,
    pub source: String,
    pub reference: String,
    pub hypothesis: Option<String>,
    pub chrf: Option<f64>,
    pub mode_label: Option<String>,
    pub glossary: BTreeMap<String, String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub dataset: String,
    pub mode: EvalMode,
    pub mode_description: String,
    /// Seed of a random draw, or "FirstN" / "All"
    pub selection_label: String,
    pub split: bool,
    pub allowed_range: Option<IdRange>,
    pub static_examples: Option<String>,
    pub items: Vec<ItemResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub corpus_chrf: Option<f64>,
}

impl EvaluationReport {
    pub fn write_json(&self, path: &Path) -> AgentResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AgentError::Persistence(e.to_string()))?;
        write_file(path, &json)
    }

    /// Write the tested items as line-aligned `testset.sa` / `testset.en`
    pub fn export_test_set(&self, dir: &Path) -> AgentResult<()> {
        fs::create_dir_all(dir).map_err(|e| {
            AgentError::Persistence(format!("Failed to create '{}': {}", dir.display(), e))
        })?;

        let sources: Vec<String> = self.items.iter().map(|i| single_line(&i.source)).collect();
        let references: Vec<String> = self
            .items
            .iter()
            .map(|i| single_line(&i.reference))
            .collect();
        write_file(&dir.join("testset.sa"), &sources.join("\n"))?;
        write_file(&dir.join("testset.en"), &references.join("\n"))
    }
}

fn single_line(text: &str) -> String {
    text.trim().replace('\n', " ")
}

fn write_file(path: &Path, content: &str) -> AgentResult<()> {
    fs::write(path, content).map_err(|e| {
        AgentError::Persistence(format!("Failed to write '{}': {}", path.display(), e))
    })
}

pub struct EvaluationRunner<'a> {
    pipeline: &'a TranslationPipeline,
}

impl<'a> EvaluationRunner<'a> {
    pub fn new(pipeline: &'a TranslationPipeline) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self, config: &EvaluationConfig) -> AgentResult<EvaluationReport> {
        let items = self.pipeline.store().corpus_items(Some(&config.dataset))?;
        if items.is_empty() {
            return Err(AgentError::NotFound(format!(
                "dataset '{}' has no items",
                config.dataset
            )));
        }

        let examples = config.mode.examples();
        let strategy = if examples.is_some() {
            config.strategy
        } else {
            PoolStrategy::Global
        };
        let plan = PartitionPlanner::new(strategy, config.restrict_pool_to_half).plan(&items);
        if plan.test_pool.is_empty() {
            return Err(AgentError::Other(format!(
                "test pool of '{}' is empty",
                config.dataset
            )));
        }

        let tests = plan.select_tests(config.selection);
        let static_examples = match examples {
            Some(ExampleSource::Static) => {
                let seed = match config.selection {
                    Selection::Random { seed, .. } => seed,
                    _ => DEFAULT_SEED,
                };
                plan.static_few_shot(&items, &tests, config.num_examples, seed)
            }
            _ => None,
        };

        info!(
            "Evaluating {} on '{}': {} items ({} in corpus)",
            config.mode,
            config.dataset,
            tests.len(),
            items.len()
        );

        let by_id: HashMap<i64, &CorpusItem> = items.iter().map(|i| (i.item_id, i)).collect();
        let mut results = Vec::with_capacity(tests.len());

        for (n, id) in tests.iter().enumerate() {
            let Some(item) = by_id.get(id) else {
                continue;
            };

            let mut request =
                TranslationRequest::new(item.source_text.clone(), config.mode.capabilities());
            match examples {
                Some(ExampleSource::Retrieved) => {
                    let query = RetrievalQuery::new(
                        item.source_text.clone(),
                        DatasetScope::Named(config.dataset.clone()),
                        config.num_examples,
                    )
                    .excluding(item.item_id)
                    .within(plan.allowed_range);
                    request = request.with_few_shot(FewShot::Retrieve(query));
                }
                Some(ExampleSource::Static) => {
                    if let Some(block) = &static_examples {
                        request = request.with_few_shot(FewShot::Static(block.clone()));
                    }
                }
                None => {}
            }

            let mut result = ItemResult {
                item_id: item.item_id,
                source: item.source_text.clone(),
                reference: item.target_text.clone(),
                hypothesis: None,
                chrf: None,
                mode_label: None,
                glossary: BTreeMap::new(),
                error: None,
            };

            match self.pipeline.run(&request).await {
                Ok(state) => {
                    result.chrf = Some(sentence_chrf(&state.final_translation, &item.target_text));
                    result.hypothesis = Some(state.final_translation);
                    result.mode_label = Some(state.mode_label);
                    result.glossary = state.evidence.glossary;
                }
                Err(e) => {
                    warn!("Item {} failed: {}", item.item_id, e);
                    result.error = Some(e.to_string());
                }
            }
            info!("[{}/{}] item {} done", n + 1, tests.len(), item.item_id);
            results.push(result);
        }

        let scored: Vec<(&str, &str)> = results
            .iter()
            .filter_map(|r| r.hypothesis.as_deref().map(|h| (h, r.reference.as_str())))
            .collect();
        let succeeded = scored.len();
        let corpus = (!scored.is_empty()).then(|| corpus_chrf(&scored));

        Ok(EvaluationReport {
            dataset: config.dataset.clone(),
            mode: config.mode,
            mode_description: config.mode.description().to_string(),
            selection_label: config.selection.label(),
            split: plan.split,
            allowed_range: plan.split.then_some(plan.allowed_range),
            static_examples,
            failed: results.len() - succeeded,
            succeeded,
            corpus_chrf: corpus,
            items: results,
        })
    }
}
