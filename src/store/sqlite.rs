//! SQLite implementation of the store traits
//!
//! One connection guarded by a mutex; every query is a blocking round trip.
//!
//! SQLite's `NOCASE` and `LIKE` fold ASCII only, which misses IAST capitals
//! such as `Ā` or `Ś`. Every column matched case-insensitively therefore has
//! a `*_folded` twin holding [`fold`] of the value, written at insert time,
//! and queries compare against the folded form of their argument.

use super::{
    CorpusItem, CorpusStore, GlossaryEntry, GlossaryStore, LexiconEntry, LexiconStore,
    MorphRecord, MorphologyStore, RunLogStore, RunRecord,
};
use crate::error::{AgentError, AgentResult};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS lexicon (
    lemma        TEXT NOT NULL,
    lemma_folded TEXT NOT NULL,
    gloss        TEXT,
    raw_markup   TEXT,
    source_tag   TEXT NOT NULL DEFAULT 'MW'
);
CREATE INDEX IF NOT EXISTS idx_lexicon_lemma ON lexicon (lemma);
CREATE INDEX IF NOT EXISTS idx_lexicon_lemma_folded ON lexicon (lemma_folded);

CREATE TABLE IF NOT EXISTS morphology (
    word        TEXT NOT NULL,
    word_folded TEXT NOT NULL,
    lemma       TEXT NOT NULL,
    tag         TEXT NOT NULL,
    sentence_id TEXT NOT NULL DEFAULT 'unknown'
);
CREATE INDEX IF NOT EXISTS idx_morphology_word_folded ON morphology (word_folded);

CREATE TABLE IF NOT EXISTS corpus (
    dataset_name TEXT NOT NULL,
    item_id      INTEGER NOT NULL,
    source_text  TEXT NOT NULL,
    target_text  TEXT NOT NULL,
    PRIMARY KEY (dataset_name, item_id)
);

CREATE TABLE IF NOT EXISTS glossary (
    term        TEXT NOT NULL,
    term_folded TEXT NOT NULL,
    definition  TEXT,
    source      TEXT,
    page        INTEGER
);
CREATE INDEX IF NOT EXISTS idx_glossary_term_folded ON glossary (term_folded);

CREATE TABLE IF NOT EXISTS run_log (
    run_id        TEXT PRIMARY KEY,
    timestamp     TEXT NOT NULL,
    mode_label    TEXT NOT NULL,
    source_text   TEXT NOT NULL,
    final_text    TEXT NOT NULL,
    evidence_json TEXT NOT NULL,
    trace_json    TEXT NOT NULL
);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

/// Case-folded key for case-insensitive matching (full Unicode lowercase)
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn lexicon_row(row: &Row<'_>) -> rusqlite::Result<LexiconEntry> {
    Ok(LexiconEntry {
        lemma: row.get(0)?,
        gloss: row.get(1)?,
        raw_markup: row.get(2)?,
        source_tag: row.get(3)?,
    })
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> AgentResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn);
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database with the full schema
    pub fn open_in_memory() -> AgentResult<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.init_schema()?;
        Ok(store)
    }

    /// Wrap an existing connection without touching its schema
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn init_schema(&self) -> AgentResult<()> {
        self.lock()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> AgentResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AgentError::Store("connection lock poisoned".to_string()))
    }

    pub fn insert_lexicon_entries(&self, entries: &[LexiconEntry]) -> AgentResult<usize> {
        self.write_lexicon(entries, false)
    }

    /// Replace the whole lexicon table
    pub fn replace_lexicon(&self, entries: &[LexiconEntry]) -> AgentResult<usize> {
        self.write_lexicon(entries, true)
    }

    fn write_lexicon(&self, entries: &[LexiconEntry], replace: bool) -> AgentResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if replace {
            tx.execute("DELETE FROM lexicon", [])?;
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO lexicon (lemma, lemma_folded, gloss, raw_markup, source_tag)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for e in entries {
                stmt.execute(params![
                    e.lemma,
                    fold(&e.lemma),
                    e.gloss,
                    e.raw_markup,
                    e.source_tag
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    pub fn insert_morph_records(&self, records: &[MorphRecord]) -> AgentResult<usize> {
        self.write_morphology(records, false)
    }

    /// Replace the whole morphology table
    pub fn replace_morphology(&self, records: &[MorphRecord]) -> AgentResult<usize> {
        self.write_morphology(records, true)
    }

    fn write_morphology(&self, records: &[MorphRecord], replace: bool) -> AgentResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if replace {
            tx.execute("DELETE FROM morphology", [])?;
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO morphology (word, word_folded, lemma, tag, sentence_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in records {
                stmt.execute(params![r.word, fold(&r.word), r.lemma, r.tag, r.sentence_id])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Replace the whole glossary table
    pub fn replace_glossary(&self, entries: &[GlossaryEntry]) -> AgentResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM glossary", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO glossary (term, term_folded, definition, source, page)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for g in entries {
                stmt.execute(params![g.term, fold(&g.term), g.definition, g.source, g.page])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// Replace every item of `dataset` with `items`
    pub fn replace_dataset(&self, dataset: &str, items: &[CorpusItem]) -> AgentResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM corpus WHERE dataset_name = ?1", [dataset])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO corpus (dataset_name, item_id, source_text, target_text)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for item in items {
                stmt.execute(params![dataset, item.item_id, item.source_text, item.target_text])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }

    /// All persisted runs, oldest first
    pub fn run_records(&self) -> AgentResult<Vec<RunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, timestamp, mode_label, source_text, final_text, evidence_json, trace_json
             FROM run_log ORDER BY timestamp, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RunRecord {
                run_id: row.get(0)?,
                timestamp: row.get(1)?,
                mode_label: row.get(2)?,
                source_text: row.get(3)?,
                final_text: row.get(4)?,
                evidence_json: row.get(5)?,
                trace_json: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl LexiconStore for SqliteStore {
    fn entries_with_lemma_in(&self, lemmas: &[String]) -> AgentResult<Vec<LexiconEntry>> {
        if lemmas.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT lemma, gloss, raw_markup, source_tag FROM lexicon WHERE lemma IN ({})",
            placeholders(lemmas.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(lemmas.iter()), lexicon_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn first_entry_with_prefix(&self, prefix: &str) -> AgentResult<Option<LexiconEntry>> {
        let conn = self.lock()?;
        let entry = conn
            .query_row(
                "SELECT lemma, gloss, raw_markup, source_tag FROM lexicon
                 WHERE lemma_folded LIKE ?1 ESCAPE '\\' ORDER BY rowid LIMIT 1",
                [escape_like(&fold(prefix))],
                lexicon_row,
            )
            .optional()?;
        Ok(entry)
    }
}

impl MorphologyStore for SqliteStore {
    fn analyses_of(&self, word: &str, limit: usize) -> AgentResult<Vec<MorphRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT word, lemma, tag, sentence_id FROM morphology
             WHERE word_folded = ?2
             ORDER BY word = ?1 DESC, rowid LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![word, fold(word), limit as i64], |row| {
            Ok(MorphRecord {
                word: row.get(0)?,
                lemma: row.get(1)?,
                tag: row.get(2)?,
                sentence_id: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl GlossaryStore for SqliteStore {
    fn entries_for_terms(&self, terms: &[String]) -> AgentResult<Vec<GlossaryEntry>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT term, definition, source, page FROM glossary
             WHERE term_folded IN ({}) ORDER BY rowid",
            placeholders(terms.len())
        );
        let folded: Vec<String> = terms.iter().map(|t| fold(t)).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(folded.iter()), |row| {
            Ok(GlossaryEntry {
                term: row.get(0)?,
                definition: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                source: row.get(2)?,
                page: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl CorpusStore for SqliteStore {
    fn corpus_items(&self, dataset: Option<&str>) -> AgentResult<Vec<CorpusItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT dataset_name, item_id, source_text, target_text FROM corpus
             WHERE ?1 IS NULL OR dataset_name = ?1
             ORDER BY dataset_name, item_id",
        )?;
        let rows = stmt.query_map([dataset], |row| {
            Ok(CorpusItem {
                dataset_name: row.get(0)?,
                item_id: row.get(1)?,
                source_text: row.get(2)?,
                target_text: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn dataset_names(&self) -> AgentResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT dataset_name FROM corpus ORDER BY dataset_name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl RunLogStore for SqliteStore {
    fn record_run(&self, record: &RunRecord) -> AgentResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO run_log (run_id, timestamp, mode_label, source_text, final_text, evidence_json, trace_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.run_id,
                record.timestamp,
                record.mode_label,
                record.source_text,
                record.final_text,
                record.evidence_json,
                record.trace_json
            ],
        )
        .map_err(|e| AgentError::Persistence(e.to_string()))?;
        Ok(())
    }
}

impl SqliteStore {
    /// Number of rows in `table`; `None` if the table does not exist
    pub fn row_count(&self, table: &str) -> AgentResult<Option<i64>> {
        let conn = self.lock()?;
        let exists: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
            row.get(0)
        })?;
        Ok(Some(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(lemma: &str, gloss: &str) -> LexiconEntry {
        LexiconEntry {
            lemma: lemma.to_string(),
            gloss: Some(gloss.to_string()),
            raw_markup: None,
            source_tag: "MW".to_string(),
        }
    }

    fn item(dataset: &str, id: i64, src: &str) -> CorpusItem {
        CorpusItem {
            dataset_name: dataset.to_string(),
            item_id: id,
            source_text: src.to_string(),
            target_text: format!("target {}", id),
        }
    }

    #[test]
    fn test_exact_lemma_lookup() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_lexicon_entries(&[entry("dharma", "law"), entry("karma", "act")])
            .unwrap();

        let found = store
            .entries_with_lemma_in(&["dharma".to_string(), "dharm".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].lemma, "dharma");
        assert!(store.entries_with_lemma_in(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_prefix_lookup_first_in_store_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_lexicon_entries(&[entry("Dharmarāja", "king of law"), entry("dharma", "law")])
            .unwrap();

        let found = store.first_entry_with_prefix("dharm").unwrap().unwrap();
        assert_eq!(found.lemma, "Dharmarāja");
        assert!(store.first_entry_with_prefix("xyz").unwrap().is_none());
    }

    #[test]
    fn test_prefix_wildcards_are_literal() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_lexicon_entries(&[entry("abc", "x")]).unwrap();
        assert!(store.first_entry_with_prefix("a_c").unwrap().is_none());
        assert!(store.first_entry_with_prefix("%").unwrap().is_none());
    }

    #[test]
    fn test_morphology_case_insensitive_and_limited() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records: Vec<MorphRecord> = (0..8)
            .map(|i| MorphRecord {
                word: if i % 2 == 0 { "Rāmaḥ" } else { "rāmaḥ" }.to_string(),
                lemma: "rāma".to_string(),
                tag: format!("case={}", i),
                sentence_id: "s1".to_string(),
            })
            .collect();
        store.insert_morph_records(&records).unwrap();

        // "R" vs "r" differs only in ASCII case
        let found = store.analyses_of("rāmaḥ", 5).unwrap();
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn test_glossary_case_insensitive() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_glossary(&[GlossaryEntry {
                term: "Dharma".to_string(),
                definition: "sacred law".to_string(),
                source: None,
                page: Some(3),
            }])
            .unwrap();
        let found = store.entries_for_terms(&["dharma".to_string()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].definition, "sacred law");
    }

    #[test]
    fn test_case_folding_covers_iast_capitals() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_glossary(&[GlossaryEntry {
                term: "ātman".to_string(),
                definition: "self".to_string(),
                source: None,
                page: None,
            }])
            .unwrap();
        store
            .insert_morph_records(&[MorphRecord {
                word: "śivaḥ".to_string(),
                lemma: "śiva".to_string(),
                tag: "pos=n,c=nom".to_string(),
                sentence_id: "s1".to_string(),
            }])
            .unwrap();
        store.insert_lexicon_entries(&[entry("ātman", "breath, soul")]).unwrap();

        let terms = store.entries_for_terms(&["Ātman".to_string()]).unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term, "ātman");

        let analyses = store.analyses_of("Śivaḥ", 5).unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].lemma, "śiva");

        let prefixed = store.first_entry_with_prefix("Ātman").unwrap().unwrap();
        assert_eq!(prefixed.lemma, "ātman");
    }

    #[test]
    fn test_exact_morphology_matches_come_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = |word: &str, tag: &str| MorphRecord {
            word: word.to_string(),
            lemma: "śiva".to_string(),
            tag: tag.to_string(),
            sentence_id: "s1".to_string(),
        };
        store
            .insert_morph_records(&[record("śivaḥ", "lower"), record("Śivaḥ", "upper")])
            .unwrap();

        let found = store.analyses_of("Śivaḥ", 5).unwrap();
        let tags: Vec<&str> = found.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["upper", "lower"]);
    }

    #[test]
    fn test_missing_glossary_table_is_unavailable() {
        let store = SqliteStore::from_connection(Connection::open_in_memory().unwrap());
        let err = store.entries_for_terms(&["dharma".to_string()]).unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(store.row_count("glossary").unwrap(), None);
    }

    #[test]
    fn test_dataset_replace_and_scope() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_dataset("mkb", &[item("mkb", 2, "b"), item("mkb", 1, "a")])
            .unwrap();
        store.replace_dataset("other", &[item("other", 1, "z")]).unwrap();
        store.replace_dataset("mkb", &[item("mkb", 1, "a2")]).unwrap();

        let mkb = store.corpus_items(Some("mkb")).unwrap();
        assert_eq!(mkb.len(), 1);
        assert_eq!(mkb[0].source_text, "a2");
        assert_eq!(store.corpus_items(None).unwrap().len(), 2);
        assert_eq!(store.dataset_names().unwrap(), vec!["mkb", "other"]);
    }

    #[test]
    fn test_run_log_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = RunRecord {
            run_id: "r1".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            mode_label: "agent_full".to_string(),
            source_text: "src".to_string(),
            final_text: "out".to_string(),
            evidence_json: "{}".to_string(),
            trace_json: "[]".to_string(),
        };
        store.record_run(&record).unwrap();
        assert_eq!(store.run_records().unwrap(), vec![record.clone()]);

        // Duplicate run id violates the primary key
        match store.record_run(&record) {
            Err(AgentError::Persistence(_)) => {}
            other => panic!("Expected Persistence error, got {:?}", other),
        }
    }
}
