//! PDF text extraction using the `pdf-extract` crate.
//!
//! `pdf-extract` returns the whole document as one string with form feeds
//! (`\x0C`) between pages; those are split back into 1-based pages.

use std::path::Path;

use crate::extract::error::{ExtractError, ExtractResult};
use crate::model::PageContent;

/// Extract the pages of the PDF at `path`.
pub fn extract_pages(path: &Path) -> ExtractResult<Vec<PageContent>> {
    let data = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_pages_from_mem(&data, &path.display().to_string())
}

/// Extract pages from PDF bytes; `origin` names the source in errors.
pub fn extract_pages_from_mem(data: &[u8], origin: &str) -> ExtractResult<Vec<PageContent>> {
    let text = pdf_extract::extract_text_from_mem(data).map_err(|e| ExtractError::Pdf {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;

    let pages = split_pages(&text);
    if pages.iter().all(|p| p.raw_text.trim().is_empty()) {
        return Err(ExtractError::EmptyDocument {
            origin: origin.to_string(),
        });
    }
    tracing::debug!(origin, pages = pages.len(), "extracted PDF text");
    Ok(pages)
}

/// Split extracted text into pages on form feeds.
///
/// Blank pages keep their number so page numbers match the PDF. A trailing
/// form feed does not produce an extra page.
pub fn split_pages(text: &str) -> Vec<PageContent> {
    let text = text.strip_suffix('\x0C').unwrap_or(text);
    text.split('\x0C')
        .enumerate()
        .map(|(i, page)| PageContent::new(i as u32 + 1, page))
        .collect()
}
