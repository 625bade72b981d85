//! Document ingestion into the knowledge index.
//!
//! Orchestrates: validate → upsert document → drop old rows → pages →
//! keyword occurrences → concept network, all inside one transaction.
//!
//! Re-ingesting a citation key deletes every row it owned and writes the
//! new version from scratch. No incremental diffing: ingesting the same
//! record twice leaves the index exactly as after the first call.

use std::collections::HashSet;

use rusqlite::{Transaction, params};
use serde::Serialize;

use crate::knowledge::context::{DEFAULT_CONTEXT_WINDOW, count_occurrences, extract_context};
use crate::knowledge::error::{KnowledgeError, KnowledgeResult};
use crate::knowledge::network;
use crate::knowledge::records::encode_list;
use crate::knowledge::store::KnowledgeStore;
use crate::model::{ExtractionResult, PageContent};

/// Configuration for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Context snippet window, in characters.
    pub context_window: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

/// What one ingestion call wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub cite_key: String,
    pub pages: usize,
    pub keyword_rows: usize,
    pub edges: usize,
}

/// Encoded document columns, prepared before the transaction starts.
struct DocumentColumns {
    authors: String,
    keywords: String,
    key_concepts: String,
}

/// Ingest one extraction result, replacing any previous version of the
/// same citation key.
///
/// The record is validated before anything is written. Storage failures
/// roll the whole document back and name the citation key that failed.
pub fn ingest_extraction(
    store: &KnowledgeStore,
    result: &ExtractionResult,
    source_path: &str,
    config: &IngestConfig,
) -> KnowledgeResult<IngestSummary> {
    let cite_key = result.metadata.cite_key.as_str();
    result
        .validate()
        .map_err(|source| KnowledgeError::InvalidRecord {
            cite_key: cite_key.to_string(),
            source,
        })?;

    let columns = DocumentColumns {
        authors: encode_list(cite_key, &result.metadata.authors)?,
        keywords: encode_list(cite_key, &result.metadata.keywords)?,
        key_concepts: encode_list(cite_key, &result.key_concepts)?,
    };
    let page_keywords = result
        .pages
        .iter()
        .map(|page| encode_list(cite_key, &page.keywords))
        .collect::<KnowledgeResult<Vec<_>>>()?;

    let summary = store.write(cite_key, |tx| {
        upsert_document(tx, result, source_path, &columns)?;
        clear_document(tx, cite_key)?;

        let mut keyword_rows = 0;
        for (page, keywords_json) in result.pages.iter().zip(&page_keywords) {
            insert_page(tx, cite_key, page, keywords_json)?;
            keyword_rows += insert_occurrences(tx, cite_key, page, config.context_window)?;
        }

        let edges = network::rebuild_in(tx, cite_key)?;
        Ok(IngestSummary {
            cite_key: cite_key.to_string(),
            pages: result.pages.len(),
            keyword_rows,
            edges,
        })
    })?;

    tracing::info!(
        cite_key,
        pages = summary.pages,
        keyword_rows = summary.keyword_rows,
        edges = summary.edges,
        "indexed document"
    );
    Ok(summary)
}

/// Delete a document and every row it owns.
///
/// Returns `false` if the citation key was not indexed.
pub fn remove_document(store: &KnowledgeStore, cite_key: &str) -> KnowledgeResult<bool> {
    let removed = store.write(cite_key, |tx| {
        clear_document(tx, cite_key)?;
        let n = tx.execute(
            "DELETE FROM documents WHERE cite_key = ?1",
            params![cite_key],
        )?;
        Ok(n > 0)
    })?;
    if removed {
        tracing::info!(cite_key, "removed document from index");
    }
    Ok(removed)
}

/// Lower-cased, trimmed, de-duplicated keywords of a page, first seen first.
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(keywords.len());
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

fn upsert_document(
    tx: &Transaction<'_>,
    result: &ExtractionResult,
    source_path: &str,
    columns: &DocumentColumns,
) -> rusqlite::Result<()> {
    let meta = &result.metadata;
    tx.execute(
        "INSERT INTO documents (cite_key, title, authors, year, keywords, key_concepts, \
                                page_count, extraction_date, file_path, processing_time) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT (cite_key) DO UPDATE SET \
             title = excluded.title, \
             authors = excluded.authors, \
             year = excluded.year, \
             keywords = excluded.keywords, \
             key_concepts = excluded.key_concepts, \
             page_count = excluded.page_count, \
             extraction_date = excluded.extraction_date, \
             file_path = excluded.file_path, \
             processing_time = excluded.processing_time",
        params![
            meta.cite_key,
            meta.title,
            columns.authors,
            meta.year,
            columns.keywords,
            columns.key_concepts,
            meta.page_count,
            meta.extraction_date,
            source_path,
            meta.processing_time,
        ],
    )?;
    Ok(())
}

fn clear_document(tx: &Transaction<'_>, cite_key: &str) -> rusqlite::Result<()> {
    for sql in [
        "DELETE FROM concept_network WHERE cite_key = ?1",
        "DELETE FROM keywords WHERE cite_key = ?1",
        "DELETE FROM pages WHERE cite_key = ?1",
    ] {
        tx.execute(sql, params![cite_key])?;
    }
    Ok(())
}

fn insert_page(
    tx: &Transaction<'_>,
    cite_key: &str,
    page: &PageContent,
    keywords_json: &str,
) -> rusqlite::Result<()> {
    let word_count = u32::try_from(page.processed_text.split_whitespace().count()).unwrap_or(u32::MAX);
    tx.execute(
        "INSERT INTO pages (cite_key, page_num, content_type, keywords, word_count, \
                            has_figures, has_tables, has_equations) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            cite_key,
            page.page_num,
            page.content_type.as_str(),
            keywords_json,
            word_count,
            !page.figures.is_empty(),
            !page.tables.is_empty(),
            !page.equations.is_empty(),
        ],
    )?;
    Ok(())
}

fn insert_occurrences(
    tx: &Transaction<'_>,
    cite_key: &str,
    page: &PageContent,
    window: usize,
) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO keywords (keyword, cite_key, page_num, frequency, context) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    let keywords = normalize_keywords(&page.keywords);
    for keyword in &keywords {
        let text = &page.processed_text;
        let frequency = u32::try_from(count_occurrences(keyword, text)).unwrap_or(u32::MAX);
        let context = extract_context(keyword, text, window);
        stmt.execute(params![keyword, cite_key, page.page_num, frequency, context])?;
    }
    tracing::debug!(cite_key, page = page.page_num, keywords = keywords.len(), "indexed page");
    Ok(keywords.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::records::{
        document_keywords, document_pages, get_document, index_counts,
    };
    use crate::model::{ContentType, DocumentMetadata, PageContent};
    use tempfile::TempDir;

    fn store() -> (TempDir, KnowledgeStore) {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::open(dir.path().join("index.db")).unwrap();
        (dir, store)
    }

    fn page(num: u32, text: &str, keywords: &[&str]) -> PageContent {
        PageContent {
            processed_text: text.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..PageContent::new(num, text)
        }
    }

    fn record(cite_key: &str, pages: Vec<PageContent>) -> ExtractionResult {
        ExtractionResult {
            metadata: DocumentMetadata {
                title: "Ammonia Synthesis Revisited".into(),
                authors: vec!["Smith, J.".into()],
                year: "2024".into(),
                page_count: pages.len() as u32,
                ..DocumentMetadata::new(cite_key)
            },
            pages,
            key_concepts: vec!["haber-bosch".into()],
            ..Default::default()
        }
    }

    #[test]
    fn normalize_trims_lowercases_and_dedupes() {
        let raw: Vec<String> = ["Catalysis", " catalysis ", "", "  ", "Ammonia"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(normalize_keywords(&raw), vec!["catalysis", "ammonia"]);
    }

    #[test]
    fn ingest_writes_all_tables() {
        let (_dir, store) = store();
        let mut first = page(1, "Catalysis of ammonia. Catalysis again.", &["Catalysis", "ammonia"]);
        first.content_type = ContentType::Abstract;
        first.figures = vec!["Figure 1".into()];

        let summary = ingest_extraction(
            &store,
            &record("smith2024", vec![first]),
            "papers/smith2024.pdf",
            &IngestConfig::default(),
        )
        .unwrap();
        assert_eq!(summary.pages, 1);
        assert_eq!(summary.keyword_rows, 2);
        assert_eq!(summary.edges, 1);

        let doc = get_document(&store, "smith2024").unwrap().unwrap();
        assert_eq!(doc.authors, vec!["Smith, J.".to_string()]);
        assert_eq!(doc.key_concepts, vec!["haber-bosch".to_string()]);
        assert_eq!(doc.file_path, "papers/smith2024.pdf");

        let pages = document_pages(&store, "smith2024").unwrap();
        assert_eq!(pages[0].content_type, ContentType::Abstract);
        assert_eq!(pages[0].word_count, 5);
        assert!(pages[0].has_figures);
        assert!(!pages[0].has_tables);
        // Page keyword list is stored as given.
        assert_eq!(pages[0].keywords, vec!["Catalysis".to_string(), "ammonia".to_string()]);

        let keywords = document_keywords(&store, "smith2024").unwrap();
        assert_eq!(keywords[0].keyword, "catalysis");
        assert_eq!(keywords[0].frequency, 2);
        assert_eq!(keywords[1].frequency, 1);
    }

    #[test]
    fn keyword_absent_from_text_gets_zero_frequency() {
        let (_dir, store) = store();
        ingest_extraction(
            &store,
            &record("doc", vec![page(1, "nothing relevant", &["zeolite"])]),
            "",
            &IngestConfig::default(),
        )
        .unwrap();

        let keywords = document_keywords(&store, "doc").unwrap();
        assert_eq!(keywords[0].frequency, 0);
        assert_eq!(keywords[0].context, "");
    }

    #[test]
    fn invalid_record_writes_nothing() {
        let (_dir, store) = store();
        let bad = record("", vec![page(1, "text", &["a"])]);

        let err = ingest_extraction(&store, &bad, "", &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidRecord { .. }));
        assert_eq!(index_counts(&store).unwrap().documents, 0);
    }

    #[test]
    fn zero_pages_is_valid() {
        let (_dir, store) = store();
        let mut empty = record("empty", Vec::new());
        empty.metadata.page_count = 12;

        let summary = ingest_extraction(&store, &empty, "", &IngestConfig::default()).unwrap();
        assert_eq!(summary.pages, 0);
        assert_eq!(summary.edges, 0);
        assert_eq!(get_document(&store, "empty").unwrap().unwrap().page_count, 12);
    }

    #[test]
    fn context_window_is_configurable() {
        let (_dir, store) = store();
        let text = format!("{} ammonia {}", "a".repeat(100), "b".repeat(100));
        ingest_extraction(
            &store,
            &record("doc", vec![page(1, &text, &["ammonia"])]),
            "",
            &IngestConfig { context_window: 10 },
        )
        .unwrap();

        let context = &document_keywords(&store, "doc").unwrap()[0].context;
        assert_eq!(context, "...aaaa ammonia bbbb...");
    }

    #[test]
    fn remove_document_deletes_everything() {
        let (_dir, store) = store();
        ingest_extraction(
            &store,
            &record("doc", vec![page(1, "a b", &["a", "b"])]),
            "",
            &IngestConfig::default(),
        )
        .unwrap();

        assert!(remove_document(&store, "doc").unwrap());
        assert!(!remove_document(&store, "doc").unwrap());
        assert_eq!(index_counts(&store).unwrap(), Default::default());
    }
}
