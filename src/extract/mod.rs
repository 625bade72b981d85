//! PDF extraction pipeline.
//!
//! Orchestrates: PDF text → bibliography metadata → keyword pass over the
//! opening pages → per-page spacing repair, classification and structured
//! extraction → [`ExtractionResult`].

pub mod analysis;
pub mod bib;
pub mod error;
pub mod llm;
pub mod pdf;
pub mod report;
pub mod setup;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use crate::knowledge::context::count_occurrences;
use crate::model::{ExtractionResult, PageContent, SectionEntry};

pub use bib::Bibliography;
pub use error::{ExtractError, ExtractResult};
pub use llm::{LlmError, OllamaClient, OllamaConfig, TextGenerator};
pub use report::{ReportOptions, SavedFiles, save_results};
pub use setup::{ModelCheck, RECOMMENDED_MODELS, check_model};

/// Pages sampled for the keyword pass.
const KEYWORD_SAMPLE_PAGES: usize = 3;
/// Keywords kept in the document metadata.
const METADATA_KEYWORDS: usize = 20;

/// Turns PDFs into extraction results using a text generator.
pub struct PaperProcessor<G: TextGenerator> {
    generator: G,
    bibliography: Bibliography,
}

impl<G: TextGenerator> PaperProcessor<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            bibliography: Bibliography::default(),
        }
    }

    /// Take titles, authors and years from `bibliography`.
    pub fn with_bibliography(mut self, bibliography: Bibliography) -> Self {
        self.bibliography = bibliography;
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Extract and analyze the PDF at `path`.
    ///
    /// The citation key is the file stem.
    pub fn process_pdf(&self, path: &Path) -> ExtractResult<ExtractionResult> {
        let started = Instant::now();
        let cite_key = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pages = pdf::extract_pages(path)?;
        let mut result = self.process_pages(&cite_key, pages);
        result.metadata.processing_time = started.elapsed().as_secs_f64();

        tracing::info!(
            cite_key = %result.metadata.cite_key,
            pages = result.pages.len(),
            keywords = result.all_keywords.len(),
            seconds = result.metadata.processing_time,
            model = self.generator.model(),
            "processed PDF"
        );
        Ok(result)
    }

    /// Analyze already extracted pages.
    ///
    /// A page is assigned every document keyword that occurs in its
    /// repaired text. Blank pages are kept but not sent to the model.
    pub fn process_pages(&self, cite_key: &str, mut pages: Vec<PageContent>) -> ExtractionResult {
        let mut metadata = self.bibliography.metadata_for(cite_key);
        metadata.page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        metadata.extraction_date = chrono::Utc::now().to_rfc3339();

        let sample = pages
            .iter()
            .take(KEYWORD_SAMPLE_PAGES)
            .map(|p| p.raw_text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let analysis = analysis::extract_keywords_and_concepts(&self.generator, &sample);
        let all_keywords = analysis.all_keywords();
        metadata.keywords = all_keywords.iter().take(METADATA_KEYWORDS).cloned().collect();

        let total = pages.len();
        let mut sections: BTreeMap<_, Vec<SectionEntry>> = BTreeMap::new();
        for page in &mut pages {
            if page.raw_text.trim().is_empty() {
                continue;
            }
            page.processed_text = analysis::fix_text_spacing(&self.generator, &page.raw_text);
            page.content_type = analysis::classify_content_type(
                &self.generator,
                &page.processed_text,
                page.page_num,
                total,
            );
            page.keywords = all_keywords
                .iter()
                .filter(|k| count_occurrences(k, &page.processed_text) > 0)
                .cloned()
                .collect();

            let structured = analysis::extract_structured_content(
                &self.generator,
                &page.processed_text,
                page.content_type,
                &all_keywords,
            );
            sections.entry(page.content_type).or_default().push(SectionEntry {
                page: page.page_num,
                content: page.processed_text.clone(),
                structured,
            });
            tracing::debug!(
                cite_key,
                page = page.page_num,
                content_type = %page.content_type,
                keywords = page.keywords.len(),
                "analyzed page"
            );
        }

        ExtractionResult {
            metadata,
            pages,
            sections,
            all_keywords,
            key_concepts: analysis.research_concepts,
        }
    }
}
