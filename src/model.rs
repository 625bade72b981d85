//! Extraction result contract shared by the extraction pipeline and the
//! knowledge index.
//!
//! An [`ExtractionResult`] is what the PDF/LLM pipeline produces for one
//! paper and what the index consumes. It round-trips through JSON so that
//! saved results can be re-indexed later without re-running extraction.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reading or validating an extraction result.
#[derive(Debug, Error, Diagnostic)]
pub enum RecordError {
    #[error("citation key is empty")]
    #[diagnostic(
        code(scixtract::record::empty_cite_key),
        help(
            "Every extraction result needs a citation key. It is normally derived \
             from the PDF file name or the bibliography entry."
        )
    )]
    EmptyCiteKey,

    #[error("invalid page number {page_num}: pages are numbered from 1")]
    #[diagnostic(code(scixtract::record::page_number))]
    InvalidPageNumber { page_num: u32 },

    #[error("page {page_num} appears more than once")]
    #[diagnostic(
        code(scixtract::record::duplicate_page),
        help("Each page number may occur only once per document.")
    )]
    DuplicatePage { page_num: u32 },

    #[error("processing time must be a finite, non-negative number of seconds (got {value})")]
    #[diagnostic(code(scixtract::record::processing_time))]
    InvalidProcessingTime { value: f64 },

    #[error("failed to read extraction result {path}")]
    #[diagnostic(
        code(scixtract::record::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed extraction result {path}: {message}")]
    #[diagnostic(
        code(scixtract::record::parse),
        help(
            "The file must be a JSON object with `metadata` (including `cite_key`), \
             `pages` and `key_concepts`, as written by `scixtract extract`."
        )
    )]
    Parse { path: String, message: String },
}

/// Structural classification of a page.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
    References,
    Appendix,
    #[default]
    Main,
}

impl ContentType {
    /// All labels, in reading order.
    pub const ALL: [ContentType; 9] = [
        Self::Abstract,
        Self::Introduction,
        Self::Methods,
        Self::Results,
        Self::Discussion,
        Self::Conclusion,
        Self::References,
        Self::Appendix,
        Self::Main,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abstract => "abstract",
            Self::Introduction => "introduction",
            Self::Methods => "methods",
            Self::Results => "results",
            Self::Discussion => "discussion",
            Self::Conclusion => "conclusion",
            Self::References => "references",
            Self::Appendix => "appendix",
            Self::Main => "main",
        }
    }

    /// Parse an exact label (case-insensitive, surrounding whitespace ignored).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|ct| ct.as_str() == label)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bibliographic and processing metadata for one paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Stable identifier, usually the PDF file stem or a BibTeX key.
    pub cite_key: String,
    #[serde(default)]
    pub title: String,
    /// Author names in citation order.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Publication year as written in the source (empty when unknown).
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub url: String,
    /// Document-level keywords chosen by the extraction pipeline.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub page_count: u32,
    /// ISO-8601 timestamp of the extraction run.
    #[serde(default)]
    pub extraction_date: String,
    /// Wall-clock seconds spent extracting.
    #[serde(default)]
    pub processing_time: f64,
}

impl DocumentMetadata {
    /// Metadata with only a citation key set.
    pub fn new(cite_key: impl Into<String>) -> Self {
        Self {
            cite_key: cite_key.into(),
            ..Default::default()
        }
    }
}

/// Content of a single PDF page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// 1-based page number.
    pub page_num: u32,
    /// Text as it came out of the PDF.
    #[serde(default)]
    pub raw_text: String,
    /// Cleaned-up text; this is what keywords are matched against.
    #[serde(default)]
    pub processed_text: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub figures: Vec<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub equations: Vec<String>,
}

impl PageContent {
    pub fn new(page_num: u32, raw_text: impl Into<String>) -> Self {
        Self {
            page_num,
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }
}

/// One page's contribution to a section of the paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub page: u32,
    pub content: String,
    /// Free-form structured extraction returned by the model.
    #[serde(default)]
    pub structured: serde_json::Value,
}

/// Everything extracted from one paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub pages: Vec<PageContent>,
    /// Pages grouped by content type.
    #[serde(default)]
    pub sections: BTreeMap<ContentType, Vec<SectionEntry>>,
    #[serde(default)]
    pub all_keywords: Vec<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
}

impl ExtractionResult {
    /// Check the invariants the knowledge index relies on.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.metadata.cite_key.trim().is_empty() {
            return Err(RecordError::EmptyCiteKey);
        }

        let time = self.metadata.processing_time;
        if !time.is_finite() || time < 0.0 {
            return Err(RecordError::InvalidProcessingTime { value: time });
        }

        let mut seen = HashSet::with_capacity(self.pages.len());
        for page in &self.pages {
            if page.page_num == 0 {
                return Err(RecordError::InvalidPageNumber {
                    page_num: page.page_num,
                });
            }
            if !seen.insert(page.page_num) {
                return Err(RecordError::DuplicatePage {
                    page_num: page.page_num,
                });
            }
        }
        Ok(())
    }

    /// Parse a result from its JSON form.
    pub fn from_json(json: &str, origin: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|e| RecordError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Load a result previously written by the extraction pipeline.
    pub fn from_file(path: &Path) -> Result<Self, RecordError> {
        let json = std::fs::read_to_string(path).map_err(|source| RecordError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtractionResult {
        ExtractionResult {
            metadata: DocumentMetadata {
                title: "Test Paper".into(),
                authors: vec!["Smith, J.".into(), "Doe, A.".into()],
                ..DocumentMetadata::new("test2024")
            },
            pages: vec![PageContent::new(1, "one"), PageContent::new(2, "two")],
            ..Default::default()
        }
    }

    #[test]
    fn content_type_labels() {
        assert_eq!(ContentType::from_label("Methods"), Some(ContentType::Methods));
        assert_eq!(ContentType::from_label("  main\n"), Some(ContentType::Main));
        assert_eq!(ContentType::from_label("methodology"), None);
        for ct in ContentType::ALL {
            assert_eq!(ContentType::from_label(ct.as_str()), Some(ct));
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn blank_cite_key_rejected() {
        let mut result = sample();
        result.metadata.cite_key = "   ".into();
        assert!(matches!(result.validate(), Err(RecordError::EmptyCiteKey)));
    }

    #[test]
    fn duplicate_and_zero_pages_rejected() {
        let mut result = sample();
        result.pages.push(PageContent::new(2, "again"));
        assert!(matches!(
            result.validate(),
            Err(RecordError::DuplicatePage { page_num: 2 })
        ));

        let mut result = sample();
        result.pages[0].page_num = 0;
        assert!(matches!(
            result.validate(),
            Err(RecordError::InvalidPageNumber { page_num: 0 })
        ));
    }

    #[test]
    fn negative_processing_time_rejected() {
        let mut result = sample();
        result.metadata.processing_time = -1.0;
        assert!(matches!(
            result.validate(),
            Err(RecordError::InvalidProcessingTime { .. })
        ));
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let json = r#"{
            "metadata": {"cite_key": "smith2024"},
            "pages": [{"page_num": 1, "content_type": "abstract", "keywords": ["catalysis"]}],
            "key_concepts": ["synthesis"]
        }"#;
        let result = ExtractionResult::from_json(json, "inline").unwrap();
        assert_eq!(result.metadata.cite_key, "smith2024");
        assert!(result.metadata.authors.is_empty());
        assert_eq!(result.pages[0].content_type, ContentType::Abstract);
        assert!(result.pages[0].processed_text.is_empty());
        assert_eq!(result.key_concepts, vec!["synthesis".to_string()]);
    }

    #[test]
    fn missing_cite_key_is_a_parse_error() {
        let err = ExtractionResult::from_json(r#"{"metadata": {"title": "x"}}"#, "inline")
            .unwrap_err();
        assert!(matches!(err, RecordError::Parse { .. }));
    }

    #[test]
    fn unknown_content_type_is_a_parse_error() {
        let json = r#"{"metadata": {"cite_key": "a"}, "pages": [{"page_num": 1, "content_type": "poem"}]}"#;
        assert!(ExtractionResult::from_json(json, "inline").is_err());
    }

    #[test]
    fn sections_serialize_with_label_keys() {
        let mut result = sample();
        result.sections.insert(
            ContentType::Abstract,
            vec![SectionEntry {
                page: 1,
                content: "one".into(),
                structured: serde_json::json!({"objective": "x"}),
            }],
        );
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["sections"]["abstract"].is_array());

        let back: ExtractionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
