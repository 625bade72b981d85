//! Row types of the knowledge index and per-document read helpers.

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::knowledge::error::{KnowledgeError, KnowledgeResult};
use crate::knowledge::store::KnowledgeStore;
use crate::model::ContentType;

/// A stored document row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub cite_key: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: String,
    pub keywords: Vec<String>,
    pub key_concepts: Vec<String>,
    pub page_count: u32,
    pub extraction_date: String,
    /// Path of the source the document was ingested from.
    pub file_path: String,
    pub processing_time: f64,
}

/// A stored page row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub cite_key: String,
    pub page_num: u32,
    pub content_type: ContentType,
    pub keywords: Vec<String>,
    pub word_count: u32,
    pub has_figures: bool,
    pub has_tables: bool,
    pub has_equations: bool,
}

/// One keyword assigned to one page of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordOccurrence {
    /// Always lower case.
    pub keyword: String,
    pub cite_key: String,
    pub page_num: u32,
    pub frequency: u32,
    pub context: String,
}

/// A directed co-occurrence edge as stored for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptEdge {
    /// The higher-ranked keyword of the pair.
    pub concept: String,
    pub related_concept: String,
    pub cite_key: String,
    pub weight: u32,
}

/// Row counts for every table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCounts {
    pub documents: u64,
    pub pages: u64,
    pub keywords: u64,
    pub edges: u64,
}

/// Document row before its JSON list columns are decoded.
struct RawDocument {
    cite_key: String,
    title: String,
    authors: String,
    year: String,
    keywords: String,
    key_concepts: String,
    page_count: u32,
    extraction_date: String,
    file_path: String,
    processing_time: f64,
}

const DOCUMENT_COLUMNS: &str = "cite_key, title, authors, year, keywords, key_concepts, \
                                page_count, extraction_date, file_path, processing_time";

impl RawDocument {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cite_key: row.get(0)?,
            title: row.get(1)?,
            authors: row.get(2)?,
            year: row.get(3)?,
            keywords: row.get(4)?,
            key_concepts: row.get(5)?,
            page_count: row.get(6)?,
            extraction_date: row.get(7)?,
            file_path: row.get(8)?,
            processing_time: row.get(9)?,
        })
    }

    fn decode(self) -> KnowledgeResult<DocumentRecord> {
        let authors = decode_list(&self.cite_key, "authors", &self.authors)?;
        let keywords = decode_list(&self.cite_key, "keywords", &self.keywords)?;
        let key_concepts = decode_list(&self.cite_key, "key_concepts", &self.key_concepts)?;
        Ok(DocumentRecord {
            cite_key: self.cite_key,
            title: self.title,
            authors,
            year: self.year,
            keywords,
            key_concepts,
            page_count: self.page_count,
            extraction_date: self.extraction_date,
            file_path: self.file_path,
            processing_time: self.processing_time,
        })
    }
}

/// Decode a JSON string list stored in a text column.
pub(crate) fn decode_list(cite_key: &str, field: &str, raw: &str) -> KnowledgeResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| KnowledgeError::Corrupt {
        cite_key: cite_key.to_string(),
        field: field.to_string(),
        message: e.to_string(),
    })
}

/// Encode a string list for a text column.
pub(crate) fn encode_list(cite_key: &str, list: &[String]) -> KnowledgeResult<String> {
    serde_json::to_string(list).map_err(|e| KnowledgeError::Serialization {
        message: format!("{cite_key}: {e}"),
    })
}

/// Clamp a SQLite aggregate to an unsigned count.
pub(crate) fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Look up one document by citation key.
pub fn get_document(store: &KnowledgeStore, cite_key: &str) -> KnowledgeResult<Option<DocumentRecord>> {
    let raw = store.read(|conn| {
        conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE cite_key = ?1"),
            params![cite_key],
            RawDocument::from_row,
        )
        .optional()
    })?;
    raw.map(RawDocument::decode).transpose()
}

/// All documents, in the order they were first indexed.
pub fn list_documents(store: &KnowledgeStore) -> KnowledgeResult<Vec<DocumentRecord>> {
    let raw = store.read(|conn| {
        let mut stmt =
            conn.prepare(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY rowid"))?;
        let rows = stmt
            .query_map([], RawDocument::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })?;
    raw.into_iter().map(RawDocument::decode).collect()
}

/// Pages of a document, by page number.
pub fn document_pages(store: &KnowledgeStore, cite_key: &str) -> KnowledgeResult<Vec<PageRecord>> {
    let raw = store.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT page_num, content_type, keywords, word_count, \
                    has_figures, has_tables, has_equations \
             FROM pages WHERE cite_key = ?1 ORDER BY page_num",
        )?;
        let rows = stmt
            .query_map(params![cite_key], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, bool>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })?;

    raw.into_iter()
        .map(
            |(page_num, label, keywords, word_count, has_figures, has_tables, has_equations)| {
                let content_type =
                    ContentType::from_label(&label).ok_or_else(|| KnowledgeError::Corrupt {
                        cite_key: cite_key.to_string(),
                        field: "content_type".into(),
                        message: format!("unknown label \"{label}\" on page {page_num}"),
                    })?;
                Ok(PageRecord {
                    cite_key: cite_key.to_string(),
                    page_num,
                    content_type,
                    keywords: decode_list(cite_key, "page keywords", &keywords)?,
                    word_count,
                    has_figures,
                    has_tables,
                    has_equations,
                })
            },
        )
        .collect()
}

/// Keyword occurrence rows of a document, in insertion order.
pub fn document_keywords(
    store: &KnowledgeStore,
    cite_key: &str,
) -> KnowledgeResult<Vec<KeywordOccurrence>> {
    store.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT keyword, page_num, frequency, context \
             FROM keywords WHERE cite_key = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![cite_key], |row| {
                Ok(KeywordOccurrence {
                    keyword: row.get(0)?,
                    cite_key: cite_key.to_string(),
                    page_num: row.get(1)?,
                    frequency: row.get(2)?,
                    context: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
}

/// Concept-network edges of a document, in insertion order.
pub fn document_edges(store: &KnowledgeStore, cite_key: &str) -> KnowledgeResult<Vec<ConceptEdge>> {
    store.read(|conn| {
        let mut stmt = conn.prepare(
            "SELECT concept, related_concept, co_occurrence_count \
             FROM concept_network WHERE cite_key = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![cite_key], |row| {
                Ok(ConceptEdge {
                    concept: row.get(0)?,
                    related_concept: row.get(1)?,
                    cite_key: cite_key.to_string(),
                    weight: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
}

/// Row counts of all four tables.
pub fn index_counts(store: &KnowledgeStore) -> KnowledgeResult<IndexCounts> {
    store.read(count_rows)
}

pub(crate) fn count_rows(conn: &Connection) -> rusqlite::Result<IndexCounts> {
    conn.query_row(
        "SELECT (SELECT COUNT(*) FROM documents), \
                (SELECT COUNT(*) FROM pages), \
                (SELECT COUNT(*) FROM keywords), \
                (SELECT COUNT(*) FROM concept_network)",
        [],
        |row| {
            Ok(IndexCounts {
                documents: to_count(row.get(0)?),
                pages: to_count(row.get(1)?),
                keywords: to_count(row.get(2)?),
                edges: to_count(row.get(3)?),
            })
        },
    )
}
