//! Knowledge index: documents, pages, keyword occurrences and concept
//! co-occurrence edges in a single SQLite file.
//!
//! Ingestion writes one document at a time, replacing everything the
//! document previously owned. Queries read the whole corpus and aggregate
//! across documents at read time.

pub mod context;
pub mod error;
pub mod export;
pub mod ingest;
pub mod network;
pub mod query;
pub mod records;
pub mod store;

pub use context::extract_context;
pub use error::{KnowledgeError, KnowledgeResult};
pub use export::{KnowledgeGraph, export_knowledge_graph, knowledge_graph};
pub use ingest::{IngestConfig, IngestSummary, ingest_extraction, remove_document};
pub use network::rebuild_network;
pub use query::{
    DocumentStats, RelatedConcept, SearchHit, get_document_stats, get_related_concepts,
    search_keywords,
};
pub use records::{
    ConceptEdge, DocumentRecord, IndexCounts, KeywordOccurrence, PageRecord, document_edges,
    document_keywords, document_pages, get_document, index_counts, list_documents,
};
pub use store::KnowledgeStore;
