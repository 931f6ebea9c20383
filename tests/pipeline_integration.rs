use anuvada::eval::{EvalMode, EvaluationConfig, EvaluationRunner};
use anuvada::ingest;
use anuvada::partition::Selection;
use anuvada::pipeline::{Stage, TranslationPipeline, TranslationRequest};
use anuvada::{Capabilities, MockGenerator, MockMode, PipelineConfig, SqliteStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const SOURCE: &str = "रामः वनं गच्छति";

fn seeded_store(dir: &TempDir) -> Arc<SqliteStore> {
    let store = SqliteStore::open(&dir.path().join("anuvada.sqlite")).unwrap();

    let lexicon = dir.path().join("lexicon.jsonl");
    fs::write(
        &lexicon,
        concat!(
            r#"{"lemma": "gam", "gloss": "to go, move"}"#,
            "\n",
            r#"{"lemma": "vana", "gloss": "forest, wood"}"#,
            "\n"
        ),
    )
    .unwrap();
    ingest::ingest_lexicon(&store, &lexicon).unwrap();

    let morphology = dir.path().join("gold.conllu");
    fs::write(
        &morphology,
        "# id = 1\nगच्छति\tगम्\tV;PRS;3;SG\nवनं\tवन\tN;ACC;SG\n",
    )
    .unwrap();
    ingest::ingest_morphology(&store, &[morphology]).unwrap();

    let glossary = dir.path().join("glossary.jsonl");
    fs::write(&glossary, r#"{"term": "रामः", "definition": "Rama"}"#).unwrap();
    ingest::ingest_glossary(&store, &glossary).unwrap();

    let root = dir.path().join("testsets");
    fs::create_dir_all(root.join("epic")).unwrap();
    fs::write(
        root.join("epic/epic.sa"),
        "रामः वनं गच्छति\nसीता गृहं गच्छति\nरामः सीतां पश्यति\nराजा नगरं रक्षति\n",
    )
    .unwrap();
    fs::write(
        root.join("epic/epic.en"),
        "Rama goes to the forest\nSita goes home\nRama sees Sita\nThe king protects the city\n",
    )
    .unwrap();
    let loaded = ingest::ingest_testsets(&store, &root).unwrap();
    assert_eq!(loaded, vec![("epic".to_string(), 4)]);

    Arc::new(store)
}

#[tokio::test]
async fn test_full_run_collects_evidence_and_persists() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mock = Arc::new(MockGenerator::new(MockMode::Fixed(
        "Rama goes to the forest.".to_string(),
    )));
    let pipeline = TranslationPipeline::new(store.clone(), mock.clone(), PipelineConfig::default());

    let state = pipeline
        .run(&TranslationRequest::new(SOURCE, Capabilities::full()))
        .await
        .unwrap();

    assert_eq!(state.final_translation, "Rama goes to the forest.");
    assert_eq!(state.mode_label, "agent_full_glossary");
    assert!(state.evidence.morphology.contains_key("गच्छति"));
    assert_eq!(state.evidence.glossary.get("रामः").map(String::as_str), Some("Rama"));

    // Glossary terminology reaches both the draft and the revision prompt
    let requests = mock.requests();
    assert!(requests.len() >= 2);
    let first = requests[0].system_prompt().unwrap_or_default();
    assert!(first.contains("रामः: Rama"));

    let stages: Vec<Stage> = state.trace.iter().map(|e| e.stage).collect();
    assert_eq!(stages.first(), Some(&Stage::Init));
    assert_eq!(stages.last(), Some(&Stage::Done));

    let runs = store.run_records().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, state.run_id);
    assert_eq!(runs[0].final_text, state.final_translation);
}

#[tokio::test]
async fn test_baseline_run_makes_one_call() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mock = Arc::new(MockGenerator::new(MockMode::Fixed("Rama goes.".to_string())));
    let pipeline = TranslationPipeline::new(store, mock.clone(), PipelineConfig::default());

    let state = pipeline
        .run(&TranslationRequest::new(SOURCE, Capabilities::none()))
        .await
        .unwrap();

    assert_eq!(mock.call_count(), 1);
    assert_eq!(state.draft_translation, state.final_translation);
    assert!(state.evidence.morphology.is_empty());
    assert!(state.evidence.glossary.is_empty());
}

#[tokio::test]
async fn test_evaluation_over_ingested_dataset() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mock = Arc::new(MockGenerator::new(MockMode::Fixed(
        "Rama goes to the forest".to_string(),
    )));
    let pipeline = TranslationPipeline::new(store, mock, PipelineConfig::default());

    let mut config = EvaluationConfig::new("epic", EvalMode::Baseline);
    config.selection = Selection::All;
    let report = EvaluationRunner::new(&pipeline).run(&config).await.unwrap();

    assert_eq!(report.items.len(), 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 0);
    // The first item's reference equals the mock output exactly
    assert_eq!(report.items[0].chrf.map(|c| c.round()), Some(100.0));
    assert!(report.corpus_chrf.is_some_and(|c| c > 0.0 && c < 100.0));

    let export: PathBuf = dir.path().join("export");
    report.export_test_set(&export).unwrap();
    let sources = fs::read_to_string(export.join("testset.sa")).unwrap();
    assert_eq!(sources.lines().count(), 4);
}

#[tokio::test]
async fn test_evaluation_of_unknown_dataset_fails() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mock = Arc::new(MockGenerator::new(MockMode::Echo));
    let pipeline = TranslationPipeline::new(store, mock, PipelineConfig::default());

    let config = EvaluationConfig::new("missing", EvalMode::FullAgent);
    assert!(EvaluationRunner::new(&pipeline).run(&config).await.is_err());
}
