//! Rich diagnostic error types for the extraction pipeline.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from PDF extraction, bibliography loading and report writing.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    #[error("failed to read PDF {origin}: {message}")]
    #[diagnostic(
        code(scixtract::extract::pdf),
        help("The file may be encrypted, damaged or not a PDF at all.")
    )]
    Pdf { origin: String, message: String },

    #[error("no text could be extracted from {origin}")]
    #[diagnostic(
        code(scixtract::extract::empty_document),
        help("Scanned PDFs without a text layer need OCR before extraction.")
    )]
    EmptyDocument { origin: String },

    #[error("failed to load bibliography {path}: {message}")]
    #[diagnostic(
        code(scixtract::extract::bibliography),
        help("Check that the file exists and is valid BibTeX.")
    )]
    Bibliography { path: String, message: String },

    #[error("I/O error on {path}")]
    #[diagnostic(
        code(scixtract::extract::io),
        help("Check that the path exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(code(scixtract::extract::serde))]
    Serialization { message: String },
}

/// Convenience alias for extraction pipeline results.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
