//! Draft -> evidence -> revise translation pipeline
//!
//! A run walks a fixed sequence of stages:
//!
//! ```text
//! INIT -> GLOSSARY -> DRAFT -> MORPHOLOGY -> DICTIONARY -> SUMMARIZE -> REVISE -> DONE
//! ```
//!
//! GLOSSARY, MORPHOLOGY, DICTIONARY and SUMMARIZE only do work when their
//! capability is switched on; DRAFT and REVISE always run, and REVISE keeps the
//! draft when no morphology or dictionary evidence was collected. Every stage
//! appends to the run's trace. Nothing is retried.
//!
//! Generation failures in DRAFT or REVISE end the run with an error. Lookup
//! and summary failures only degrade the evidence. Persisting the run record
//! is best effort.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = TranslationPipeline::new(store, generator, PipelineConfig::default());
//! let request = TranslationRequest::new("rājā dharmaṃ pālayati", Capabilities::full());
//! let state = pipeline.run(&request).await?;
//! println!("{}", state.final_translation);
//! ```

use crate::config::{Capabilities, PipelineConfig};
use crate::error::{AgentError, AgentResult};
use crate::evidence::{EvidenceAggregator, EvidenceBundle};
use crate::glossary::{GlossaryMatcher, format_glossary_lines};
use crate::lexicon::LexiconResolver;
use crate::llm::{ChatMessage, GenerationRequest, TextGenerator};
use crate::morphology::MorphologyResolver;
use crate::prompts;
use crate::retrieval::{RetrievalContextBuilder, RetrievalQuery};
use crate::store::{KnowledgeStore, RunRecord};
use crate::text::{clean_response, source_tokens};
use crate::transliterate::{DevanagariToIast, Transliterator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Glossary,
    Draft,
    Morphology,
    Dictionary,
    Summarize,
    Revise,
    Done,
}

impl Stage {
    /// The stage that follows; DONE is terminal
    pub fn next(self) -> Stage {
        match self {
            Stage::Init => Stage::Glossary,
            Stage::Glossary => Stage::Draft,
            Stage::Draft => Stage::Morphology,
            Stage::Morphology => Stage::Dictionary,
            Stage::Dictionary => Stage::Summarize,
            Stage::Summarize => Stage::Revise,
            Stage::Revise => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }

    /// Whether the stage does any work under the given capabilities
    pub fn is_enabled(self, caps: Capabilities) -> bool {
        match self {
            Stage::Glossary => caps.glossary,
            Stage::Morphology => caps.grammar,
            Stage::Dictionary | Stage::Summarize => caps.dictionary,
            Stage::Init | Stage::Draft | Stage::Revise | Stage::Done => true,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::Glossary => "GLOSSARY",
            Stage::Draft => "DRAFT",
            Stage::Morphology => "MORPHOLOGY",
            Stage::Dictionary => "DICTIONARY",
            Stage::Summarize => "SUMMARIZE",
            Stage::Revise => "REVISE",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub stage: Stage,
    pub message: String,
}

/// Example pairs supplied to the draft for style guidance
#[derive(Debug, Clone, PartialEq)]
pub enum FewShot {
    /// Retrieve similar pairs for this item
    Retrieve(RetrievalQuery),
    /// A fixed, pre-rendered block shared by a whole evaluation run
    Static(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleSource {
    Retrieved,
    Static,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub source_text: String,
    pub capabilities: Capabilities,
    pub few_shot: Option<FewShot>,
}

impl TranslationRequest {
    pub fn new(source_text: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            source_text: source_text.into(),
            capabilities,
            few_shot: None,
        }
    }

    pub fn with_few_shot(mut self, few_shot: FewShot) -> Self {
        self.few_shot = Some(few_shot);
        self
    }
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub source_text: String,
    pub draft_translation: String,
    pub final_translation: String,
    pub evidence: EvidenceBundle,
    pub trace: Vec<TraceEvent>,
    pub mode_label: String,
    /// Examples actually injected into the draft, if any
    pub examples: Option<ExampleSource>,
    pub generation_calls: usize,
}

impl PipelineState {
    fn new(source_text: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            source_text: source_text.to_string(),
            draft_translation: String::new(),
            final_translation: String::new(),
            evidence: EvidenceBundle::default(),
            trace: Vec::new(),
            mode_label: String::new(),
            examples: None,
            generation_calls: 0,
        }
    }

    fn log(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        debug!("[{}] {}", stage, message);
        self.trace.push(TraceEvent { stage, message });
    }
}

/// Deterministic label naming the configuration a run used
pub fn mode_label(caps: Capabilities, examples: Option<ExampleSource>) -> String {
    let mut label = match (caps.dictionary, caps.grammar) {
        (true, true) => "agent_full",
        (true, false) => "agent_dict_only",
        (false, true) => "agent_grammar_only",
        (false, false) => "agent_baseline_fallback",
    }
    .to_string();

    match examples {
        Some(ExampleSource::Retrieved) => label.push_str("_rag"),
        Some(ExampleSource::Static) => label.push_str("_fewshot"),
        None => {}
    }
    if caps.glossary {
        label.push_str("_glossary");
    }
    label
}

/// Intermediate values handed from one stage to the next
#[derive(Default)]
struct Scratch {
    examples: Option<String>,
    glossary_block: String,
    lookup_terms: BTreeSet<String>,
    dictionary: BTreeMap<String, String>,
}

pub struct TranslationPipeline {
    store: Arc<dyn KnowledgeStore>,
    generator: Arc<dyn TextGenerator>,
    transliterator: Arc<dyn Transliterator>,
    config: PipelineConfig,
}

impl TranslationPipeline {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        generator: Arc<dyn TextGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            transliterator: Arc::new(DevanagariToIast),
            config,
        }
    }

    pub fn with_transliterator(mut self, transliterator: Arc<dyn Transliterator>) -> Self {
        self.transliterator = transliterator;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn KnowledgeStore {
        &*self.store
    }

    /// Run every stage in order and persist the outcome
    pub async fn run(&self, request: &TranslationRequest) -> AgentResult<PipelineState> {
        let mut state = PipelineState::new(&request.source_text);
        let mut scratch = Scratch::default();
        let caps = request.capabilities;

        let mut stage = Stage::Init;
        loop {
            if stage.is_enabled(caps) {
                self.execute(stage, request, &mut state, &mut scratch).await?;
            } else {
                skip(stage, &mut state, &mut scratch);
            }
            if stage == Stage::Done {
                break;
            }
            stage = stage.next();
        }

        if let Err(e) = self.persist(&state) {
            warn!("Failed to save run {}: {}", state.run_id, e);
        }
        Ok(state)
    }

    async fn execute(
        &self,
        stage: Stage,
        request: &TranslationRequest,
        state: &mut PipelineState,
        scratch: &mut Scratch,
    ) -> AgentResult<()> {
        match stage {
            Stage::Init => self.prepare_examples(request, state, scratch),
            Stage::Glossary => self.apply_glossary(state, scratch),
            Stage::Draft => self.draft(state, scratch).await?,
            Stage::Morphology => self.analyze_morphology(state, scratch),
            Stage::Dictionary => self.look_up_dictionary(state, scratch),
            Stage::Summarize => self.summarize(state, scratch).await,
            Stage::Revise => self.revise(state, scratch).await?,
            Stage::Done => {
                state.mode_label = mode_label(request.capabilities, state.examples);
                let message = format!(
                    "Finished as {} after {} generation calls",
                    state.mode_label, state.generation_calls
                );
                state.log(Stage::Done, message);
            }
        }
        Ok(())
    }

    fn prepare_examples(
        &self,
        request: &TranslationRequest,
        state: &mut PipelineState,
        scratch: &mut Scratch,
    ) {
        state.log(Stage::Init, format!("Run {} started", state.run_id));

        match &request.few_shot {
            None => {}
            Some(FewShot::Static(block)) if block.trim().is_empty() => {
                state.log(Stage::Init, "Static examples empty, none used");
            }
            Some(FewShot::Static(block)) => {
                scratch.examples = Some(block.clone());
                state.examples = Some(ExampleSource::Static);
                state.log(Stage::Init, "Using static few-shot examples");
            }
            Some(FewShot::Retrieve(query)) => {
                let builder =
                    RetrievalContextBuilder::new(&*self.store, self.config.similarity_threshold);
                match builder.retrieve(query) {
                    Ok(context) => match context.render() {
                        Some(block) => {
                            scratch.examples = Some(block);
                            state.examples = Some(ExampleSource::Retrieved);
                            state.log(
                                Stage::Init,
                                format!("Retrieved {} similar examples", context.examples.len()),
                            );
                        }
                        None => state.log(Stage::Init, "No similar examples found"),
                    },
                    Err(e) => {
                        warn!("Example retrieval failed: {}", e);
                        state.log(Stage::Init, format!("Example retrieval failed: {}", e));
                    }
                }
            }
        }
    }

    fn apply_glossary(&self, state: &mut PipelineState, scratch: &mut Scratch) {
        let terms = GlossaryMatcher::new(&*self.store).find_terms(&state.source_text);
        if terms.is_empty() {
            state.log(Stage::Glossary, "Glossary enabled but no terms found");
            return;
        }

        scratch.glossary_block = prompts::glossary_addendum(&format_glossary_lines(&terms));
        state.log(
            Stage::Glossary,
            format!("Glossary applied for {} terms", terms.len()),
        );
        state.evidence.glossary = terms;
    }

    async fn draft(&self, state: &mut PipelineState, scratch: &Scratch) -> AgentResult<()> {
        let system = prompts::draft_system(scratch.examples.as_deref()) + &scratch.glossary_block;
        let request = self.request(system, prompts::draft_user(&state.source_text));

        let raw = self.call(state, &request).await.inspect_err(|e| {
            warn!("Draft generation failed: {}", e);
        })?;
        state.draft_translation = clean_response(&raw);
        let message = format!(
            "Draft generated ({} chars)",
            state.draft_translation.chars().count()
        );
        state.log(Stage::Draft, message);
        Ok(())
    }

    fn analyze_morphology(&self, state: &mut PipelineState, scratch: &mut Scratch) {
        let resolver = MorphologyResolver::new(&*self.store, self.config.morphology_limit);
        let mut seen = BTreeSet::new();
        let tokens: Vec<String> = source_tokens(&state.source_text)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        let (mut hits, mut failed) = (0usize, 0usize);

        for token in &tokens {
            match resolver.analyze(token) {
                Ok(analysis) => match analysis.best() {
                    Some(best) => {
                        hits += 1;
                        state.evidence.add_morphology(token, &best.lemma, &best.tags);
                        scratch.lookup_terms.insert(best.lemma.clone());
                    }
                    None => {
                        scratch.lookup_terms.insert(token.clone());
                    }
                },
                Err(e) => {
                    failed += 1;
                    warn!("Morphology lookup failed for '{}': {}", token, e);
                    scratch.lookup_terms.insert(token.clone());
                }
            }
        }

        let mut message = format!(
            "Analyzed {} tokens, {} with attested lemmas",
            tokens.len(),
            hits
        );
        if failed > 0 {
            message.push_str(&format!(" ({} lookups failed)", failed));
        }
        state.log(Stage::Morphology, message);
    }

    fn look_up_dictionary(&self, state: &mut PipelineState, scratch: &mut Scratch) {
        if scratch.lookup_terms.is_empty() {
            state.log(Stage::Dictionary, "No terms to look up");
            return;
        }

        let terms: Vec<&String> = scratch.lookup_terms.iter().collect();
        let resolver = LexiconResolver::new(&*self.store, &*self.transliterator, &self.config);
        let lookup = resolver.resolve(&terms);

        scratch.dictionary = lookup.found();
        state.log(
            Stage::Dictionary,
            format!(
                "Looked up {} terms, {} entries found",
                terms.len(),
                scratch.dictionary.len()
            ),
        );
        for (term, err) in &lookup.failures {
            state.log(Stage::Dictionary, format!("Lookup failed for '{}': {}", term, err));
        }
    }

    async fn summarize(&self, state: &mut PipelineState, scratch: &mut Scratch) {
        if scratch.dictionary.is_empty() {
            state.log(Stage::Summarize, "No dictionary entries to summarize");
            return;
        }

        let aggregator = EvidenceAggregator::new(
            &*self.generator,
            self.config.summary_threshold,
            self.config.summary_max_tokens,
        );
        let total = scratch.dictionary.len();
        let compaction = aggregator.compact(std::mem::take(&mut scratch.dictionary)).await;

        state.generation_calls += compaction.summarized + compaction.failures.len();
        state.evidence.dictionary_summary = compaction.entries;
        state.log(
            Stage::Summarize,
            format!("Summarized {} of {} entries", compaction.summarized, total),
        );
        for (term, err) in &compaction.failures {
            state.log(
                Stage::Summarize,
                format!("Summary failed for '{}', raw entry kept: {}", term, err),
            );
        }
    }

    async fn revise(&self, state: &mut PipelineState, scratch: &Scratch) -> AgentResult<()> {
        let evidence = state.evidence.evidence_text();
        if evidence.trim().is_empty() {
            state.final_translation = state.draft_translation.clone();
            state.log(Stage::Revise, "No evidence collected, draft kept");
            return Ok(());
        }

        let system = format!("{}{}", prompts::REVISION_SYSTEM, scratch.glossary_block);
        let user = prompts::revision_user(&state.source_text, &state.draft_translation, &evidence);
        let request = self.request(system, user);

        let raw = self.call(state, &request).await.inspect_err(|e| {
            warn!("Revision generation failed: {}", e);
        })?;
        let revised = clean_response(&raw);
        if revised.is_empty() {
            state.final_translation = state.draft_translation.clone();
            state.log(Stage::Revise, "Revision came back empty, draft kept");
        } else {
            state.final_translation = revised;
            state.log(Stage::Revise, "Revision applied");
        }
        Ok(())
    }

    fn request(&self, system: String, user: String) -> GenerationRequest {
        GenerationRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
    }

    async fn call(
        &self,
        state: &mut PipelineState,
        request: &GenerationRequest,
    ) -> AgentResult<String> {
        state.generation_calls += 1;
        self.generator.generate(request).await
    }

    fn persist(&self, state: &PipelineState) -> AgentResult<()> {
        let record = RunRecord {
            run_id: state.run_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            mode_label: state.mode_label.clone(),
            source_text: state.source_text.clone(),
            final_text: state.final_translation.clone(),
            evidence_json: serde_json::to_string(&state.evidence)
                .map_err(|e| AgentError::Persistence(e.to_string()))?,
            trace_json: serde_json::to_string(&state.trace)
                .map_err(|e| AgentError::Persistence(e.to_string()))?,
        };
        self.store.record_run(&record)?;
        info!("Saved run {} ({})", record.run_id, record.mode_label);
        Ok(())
    }
}

fn skip(stage: Stage, state: &mut PipelineState, scratch: &mut Scratch) {
    match stage {
        Stage::Glossary => state.log(stage, "Glossary disabled"),
        Stage::Morphology => {
            scratch
                .lookup_terms
                .extend(source_tokens(&state.source_text));
            state.log(stage, "Morphology analysis skipped, surface forms used");
        }
        Stage::Dictionary => state.log(stage, "Dictionary lookup skipped"),
        Stage::Summarize => state.log(stage, "Summarization skipped"),
        Stage::Init | Stage::Draft | Stage::Revise | Stage::Done => {}
    }
}
