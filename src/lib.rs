// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # scixtract
//!
//! Extraction of academic PDFs with a local LLM, and a searchable knowledge
//! index over the results.
//!
//! ## Architecture
//!
//! - **Records** (`model`): the extraction result format shared by both halves
//! - **Extraction** (`extract`): PDF text, BibTeX metadata and Ollama analysis passes
//! - **Knowledge index** (`knowledge`): SQLite store of documents, pages,
//!   keyword occurrences and concept co-occurrence edges, with search,
//!   statistics and graph export
//! - **Configuration** (`config`, `paths`): TOML file, environment overrides
//!   and XDG locations
//!
//! ## Library usage
//!
//! ```no_run
//! use scixtract::knowledge::{self, IngestConfig, KnowledgeStore};
//! use scixtract::model::ExtractionResult;
//!
//! let store = KnowledgeStore::open("knowledge_index.db").unwrap();
//! let result = ExtractionResult::from_file("smith2024_ai_extraction.json".as_ref()).unwrap();
//! knowledge::ingest_extraction(&store, &result, "smith2024.pdf", &IngestConfig::default()).unwrap();
//!
//! for hit in knowledge::search_keywords(&store, "catalysis", 10).unwrap() {
//!     println!("{} p.{}: {}", hit.cite_key, hit.page_num, hit.context);
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod knowledge;
pub mod model;
pub mod paths;
