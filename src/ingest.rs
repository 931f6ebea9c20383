//! Loading reference data into the store
//!
//! Supported inputs:
//! - lexicon: JSON lines with `lemma`, `gloss`, `raw_markup`, optional `source_tag`
//! - morphology: CoNLL-like text; `# id = X` sets the sentence id, data lines are
//!   `word lemma tag` separated by tabs (or any whitespace)
//! - parallel corpus: two line-aligned files, ids are 1-based line numbers
//! - glossary: JSON lines with `term`, `definition`, optional `source`, `page`
//!
//! Each ingest call replaces what it loads and writes in one transaction.

use crate::error::{AgentError, AgentResult};
use crate::store::{CorpusItem, GlossaryEntry, LexiconEntry, MorphRecord, SqliteStore};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_SOURCE_TAG: &str = "MW";
const UNKNOWN_SENTENCE: &str = "unknown";

#[derive(Deserialize)]
struct LexiconLine {
    lemma: String,
    #[serde(default)]
    gloss: Option<String>,
    #[serde(default)]
    raw_markup: Option<String>,
    #[serde(default)]
    source_tag: Option<String>,
}

#[derive(Deserialize)]
struct GlossaryLine {
    term: String,
    definition: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    page: Option<i64>,
}

fn read(path: &Path) -> AgentResult<String> {
    fs::read_to_string(path)
        .map_err(|e| AgentError::Ingest(format!("Failed to read '{}': {}", path.display(), e)))
}

/// Parse non-blank JSON lines, reporting the 1-based line of the first bad one
fn json_lines<T: for<'de> Deserialize<'de>>(content: &str) -> AgentResult<Vec<T>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| AgentError::Ingest(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

pub fn parse_lexicon(content: &str) -> AgentResult<Vec<LexiconEntry>> {
    let lines: Vec<LexiconLine> = json_lines(content)?;
    Ok(lines
        .into_iter()
        .filter(|l| !l.lemma.trim().is_empty())
        .map(|l| LexiconEntry {
            lemma: l.lemma.trim().to_string(),
            gloss: l.gloss,
            raw_markup: l.raw_markup,
            source_tag: l.source_tag.unwrap_or_else(|| DEFAULT_SOURCE_TAG.to_string()),
        })
        .collect())
}

pub fn parse_morphology(content: &str) -> Vec<MorphRecord> {
    let mut sentence_id = UNKNOWN_SENTENCE.to_string();
    let mut records = Vec::new();

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# id") {
            if let Some((_, id)) = line.split_once('=') {
                sentence_id = id.trim().to_string();
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let mut fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            fields = line.split_whitespace().collect();
        }
        if let [word, lemma, tag, ..] = fields[..] {
            records.push(MorphRecord {
                word: word.trim().to_string(),
                lemma: lemma.trim().to_string(),
                tag: tag.trim().to_string(),
                sentence_id: sentence_id.clone(),
            });
        }
    }

    records
}

/// Pair line `i` of `source` with line `i` of `target`. Lines with an empty
/// source are skipped but keep their number, so ids stay stable.
pub fn parse_parallel(dataset: &str, source: &str, target: &str) -> Vec<CorpusItem> {
    let sources: Vec<&str> = source.lines().collect();
    let targets: Vec<&str> = target.lines().collect();
    if sources.len() != targets.len() {
        warn!(
            "Line count mismatch in '{}': {} source vs {} target, using the shorter",
            dataset,
            sources.len(),
            targets.len()
        );
    }

    sources
        .iter()
        .zip(targets.iter())
        .enumerate()
        .filter(|(_, (src, _))| !src.trim().is_empty())
        .map(|(i, (src, tgt))| CorpusItem {
            dataset_name: dataset.to_string(),
            item_id: i as i64 + 1,
            source_text: src.trim().to_string(),
            target_text: tgt.trim().to_string(),
        })
        .collect()
}

pub fn parse_glossary(content: &str) -> AgentResult<Vec<GlossaryEntry>> {
    let lines: Vec<GlossaryLine> = json_lines(content)?;
    Ok(lines
        .into_iter()
        .filter(|l| !l.term.trim().is_empty())
        .map(|l| GlossaryEntry {
            term: l.term.trim().to_string(),
            definition: l.definition.trim().to_string(),
            source: l.source,
            page: l.page,
        })
        .collect())
}

pub fn ingest_lexicon(store: &SqliteStore, path: &Path) -> AgentResult<usize> {
    let entries = parse_lexicon(&read(path)?)
        .map_err(|e| AgentError::Ingest(format!("{}: {}", path.display(), e)))?;
    let count = store.replace_lexicon(&entries)?;
    info!("Loaded {} lexicon entries from {}", count, path.display());
    Ok(count)
}

/// Load every file into one fresh morphology table
pub fn ingest_morphology(store: &SqliteStore, paths: &[PathBuf]) -> AgentResult<usize> {
    let mut records = Vec::new();
    for path in paths {
        let parsed = parse_morphology(&read(path)?);
        info!("Parsed {} morphology records from {}", parsed.len(), path.display());
        records.extend(parsed);
    }
    store.replace_morphology(&records)
}

pub fn ingest_parallel(
    store: &SqliteStore,
    dataset: &str,
    source_path: &Path,
    target_path: &Path,
) -> AgentResult<usize> {
    let items = parse_parallel(dataset, &read(source_path)?, &read(target_path)?);
    let count = store.replace_dataset(dataset, &items)?;
    info!("Loaded {} pairs into dataset '{}'", count, dataset);
    Ok(count)
}

/// Load every `<name>/<name>.sa` + `<name>/<name>.en` pair under `root` as
/// dataset `<name>`. Directories without both files are skipped.
pub fn ingest_testsets(store: &SqliteStore, root: &Path) -> AgentResult<Vec<(String, usize)>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| AgentError::Ingest(format!("Failed to list '{}': {}", root.display(), e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut loaded = Vec::new();
    for dir in dirs {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let source = dir.join(format!("{}.sa", name));
        let target = dir.join(format!("{}.en", name));
        if !source.is_file() || !target.is_file() {
            warn!("Skipping '{}': expected {}.sa and {}.en", dir.display(), name, name);
            continue;
        }
        let count = ingest_parallel(store, &name, &source, &target)?;
        loaded.push((name, count));
    }
    Ok(loaded)
}

pub fn ingest_glossary(store: &SqliteStore, path: &Path) -> AgentResult<usize> {
    let entries = parse_glossary(&read(path)?)
        .map_err(|e| AgentError::Ingest(format!("{}: {}", path.display(), e)))?;
    let count = store.replace_glossary(&entries)?;
    info!("Loaded {} glossary terms from {}", count, path.display());
    Ok(count)
}
