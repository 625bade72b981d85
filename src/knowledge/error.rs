//! Rich diagnostic error types for the knowledge index.

use miette::Diagnostic;
use thiserror::Error;

use crate::model::RecordError;

/// Errors from knowledge index operations.
#[derive(Debug, Error, Diagnostic)]
pub enum KnowledgeError {
    #[error("invalid extraction result for \"{cite_key}\"")]
    #[diagnostic(
        code(scixtract::knowledge::invalid_record),
        help("The record was rejected before anything was written. Fix the input and re-run.")
    )]
    InvalidRecord {
        cite_key: String,
        #[source]
        source: RecordError,
    },

    #[error("ingestion failed for \"{cite_key}\"")]
    #[diagnostic(
        code(scixtract::knowledge::ingest_failed),
        help(
            "The document's update was rolled back, so the index still holds the \
             previous version (if any). Check disk space and permissions on the index file."
        )
    )]
    IngestFailed {
        cite_key: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("knowledge index unavailable at {path}")]
    #[diagnostic(
        code(scixtract::knowledge::unavailable),
        help(
            "The index file could not be opened or queried. Check that the path is \
             correct and readable, and that the file is a scixtract index."
        )
    )]
    Unavailable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("corrupt {field} stored for \"{cite_key}\": {message}")]
    #[diagnostic(
        code(scixtract::knowledge::corrupt),
        help("Re-ingest the document to rewrite its rows.")
    )]
    Corrupt {
        cite_key: String,
        field: String,
        message: String,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(code(scixtract::knowledge::serde))]
    Serialization { message: String },

    #[error("failed to write knowledge graph to {path}")]
    #[diagnostic(
        code(scixtract::knowledge::export),
        help("Check that the destination directory is writable.")
    )]
    Export {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create index directory {path}")]
    #[diagnostic(
        code(scixtract::knowledge::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for knowledge index results.
pub type KnowledgeResult<T> = std::result::Result<T, KnowledgeError>;
