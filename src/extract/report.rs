//! Files written for each processed paper.
//!
//! `<stem>_ai_extraction.json` is the full [`ExtractionResult`] and the only
//! file the knowledge index reads back. The Markdown rendering and the
//! keyword summary are for people.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::extract::error::{ExtractError, ExtractResult};
use crate::model::{ContentType, ExtractionResult};

/// Keywords listed in the Markdown header.
const HEADER_KEYWORDS: usize = 15;
/// Key concepts listed in the Markdown header.
const HEADER_CONCEPTS: usize = 10;

/// Order of sections in the Markdown body; references come last.
const BODY_SECTIONS: [ContentType; 8] = [
    ContentType::Abstract,
    ContentType::Introduction,
    ContentType::Methods,
    ContentType::Results,
    ContentType::Discussion,
    ContentType::Conclusion,
    ContentType::Main,
    ContentType::Appendix,
];

/// Which optional files to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub markdown: bool,
    pub keywords: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            markdown: true,
            keywords: true,
        }
    }
}

/// Paths of the files written by [`save_results`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFiles {
    pub extraction: PathBuf,
    pub markdown: Option<PathBuf>,
    pub keywords: Option<PathBuf>,
}

#[derive(Serialize)]
struct KeywordSummary<'a> {
    cite_key: &'a str,
    title: &'a str,
    keywords: &'a [String],
    key_concepts: &'a [String],
    extraction_date: &'a str,
}

/// Write the result files for `pdf_path` into `output_dir`.
pub fn save_results(
    result: &ExtractionResult,
    output_dir: &Path,
    pdf_path: &Path,
    options: ReportOptions,
) -> ExtractResult<SavedFiles> {
    std::fs::create_dir_all(output_dir).map_err(|source| ExtractError::Io {
        path: output_dir.display().to_string(),
        source,
    })?;
    let stem = file_stem(pdf_path);

    let extraction = output_dir.join(format!("{stem}_ai_extraction.json"));
    write_file(&extraction, &to_json(result)?)?;

    let markdown = if options.markdown {
        let path = output_dir.join(format!("{stem}_ai_processed.md"));
        write_file(&path, &generate_markdown(result, pdf_path))?;
        Some(path)
    } else {
        None
    };

    let keywords = if options.keywords {
        let path = output_dir.join(format!("{stem}_keywords.json"));
        let summary = KeywordSummary {
            cite_key: &result.metadata.cite_key,
            title: &result.metadata.title,
            keywords: &result.all_keywords,
            key_concepts: &result.key_concepts,
            extraction_date: &result.metadata.extraction_date,
        };
        write_file(&path, &to_json(&summary)?)?;
        Some(path)
    } else {
        None
    };

    tracing::info!(dir = %output_dir.display(), stem = %stem, "saved extraction results");
    Ok(SavedFiles {
        extraction,
        markdown,
        keywords,
    })
}

/// Render a result as a readable Markdown document.
pub fn generate_markdown(result: &ExtractionResult, pdf_path: &Path) -> String {
    let meta = &result.metadata;
    let or_unknown = |s: &str| if s.is_empty() { "Unknown".to_string() } else { s.to_string() };
    let title = if meta.title.is_empty() {
        title_case(&file_stem(pdf_path).replace('_', " "))
    } else {
        meta.title.clone()
    };
    let authors = if meta.authors.is_empty() {
        "Unknown".to_string()
    } else {
        meta.authors.join(", ")
    };
    let doi = if meta.doi.is_empty() { "Not available" } else { meta.doi.as_str() };

    let mut lines = vec![
        format!("# {title}"),
        String::new(),
        "## Document Information".into(),
        String::new(),
        format!("**Citation Key:** `{}`  ", meta.cite_key),
        format!("**Authors:** {authors}  "),
        format!("**Year:** {}  ", or_unknown(&meta.year)),
        format!("**Journal:** {}  ", or_unknown(&meta.journal)),
        format!("**DOI:** {doi}  "),
        format!("**Processed:** {}  ", meta.extraction_date),
        String::new(),
        "## Keywords and Concepts".into(),
        String::new(),
        format!("**Keywords:** {}  ", head(&result.all_keywords, HEADER_KEYWORDS)),
        format!("**Key Concepts:** {}  ", head(&result.key_concepts, HEADER_CONCEPTS)),
        String::new(),
        "---".into(),
        String::new(),
    ];

    for section in BODY_SECTIONS.iter().chain([&ContentType::References]) {
        let Some(entries) = result.sections.get(section) else {
            continue;
        };
        lines.push(format!("## {}", title_case(section.as_str())));
        lines.push(String::new());
        for entry in entries {
            lines.push(format!("### Page {}", entry.page));
            lines.push(String::new());
            lines.push(entry.content.clone());
            lines.push(String::new());

            let has_data = entry
                .structured
                .as_object()
                .is_some_and(|obj| !obj.is_empty() && !obj.contains_key("extraction_error"));
            if *section != ContentType::References && has_data {
                let pretty = serde_json::to_string_pretty(&entry.structured).unwrap_or_default();
                lines.push("**Structured Information:**".into());
                lines.push(String::new());
                lines.push("```json".into());
                lines.push(pretty);
                lines.push("```".into());
                lines.push(String::new());
            }
        }
    }

    lines.join("\n")
}

fn head(items: &[String], n: usize) -> String {
    items.iter().take(n).cloned().collect::<Vec<_>>().join(", ")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> ExtractResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| ExtractError::Serialization {
        message: e.to_string(),
    })
}

fn write_file(path: &Path, contents: &str) -> ExtractResult<()> {
    std::fs::write(path, contents).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentMetadata, PageContent, SectionEntry};
    use tempfile::TempDir;

    fn sample() -> ExtractionResult {
        let mut result = ExtractionResult {
            metadata: DocumentMetadata {
                authors: vec!["Smith, J.".into()],
                year: "2024".into(),
                ..DocumentMetadata::new("smith2024")
            },
            pages: vec![PageContent::new(1, "abstract text")],
            all_keywords: vec!["catalysis".into(), "ammonia".into()],
            key_concepts: vec!["synthesis".into()],
            ..Default::default()
        };
        result.sections.insert(
            ContentType::Abstract,
            vec![SectionEntry {
                page: 1,
                content: "abstract text".into(),
                structured: serde_json::json!({"objective": "make ammonia"}),
            }],
        );
        result.sections.insert(
            ContentType::References,
            vec![SectionEntry {
                page: 9,
                content: "[1] Someone".into(),
                structured: serde_json::json!({"extraction_error": "x"}),
            }],
        );
        result
    }

    #[test]
    fn markdown_has_header_and_sections() {
        let md = generate_markdown(&sample(), Path::new("papers/smith_et_al_2024.pdf"));
        assert!(md.starts_with("# Smith Et Al 2024\n"));
        assert!(md.contains("**Authors:** Smith, J.  "));
        assert!(md.contains("**Journal:** Unknown  "));
        assert!(md.contains("**DOI:** Not available  "));
        assert!(md.contains("**Keywords:** catalysis, ammonia  "));
        assert!(md.contains("## Abstract"));
        assert!(md.contains("\"objective\": \"make ammonia\""));

        let abstract_at = md.find("## Abstract").unwrap();
        let references_at = md.find("## References").unwrap();
        assert!(abstract_at < references_at);
        assert!(!md.contains("extraction_error"));
    }

    #[test]
    fn save_writes_requested_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let saved = save_results(
            &sample(),
            &out,
            Path::new("smith2024.pdf"),
            ReportOptions {
                markdown: false,
                keywords: true,
            },
        )
        .unwrap();

        assert_eq!(saved.extraction, out.join("smith2024_ai_extraction.json"));
        assert!(saved.markdown.is_none());
        let back = ExtractionResult::from_file(&saved.extraction).unwrap();
        assert_eq!(back, sample());

        let keywords: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(saved.keywords.unwrap()).unwrap())
                .unwrap();
        assert_eq!(keywords["cite_key"], "smith2024");
        assert_eq!(keywords["key_concepts"][0], "synthesis");
    }
}
