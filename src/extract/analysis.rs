//! LLM analysis passes over page text.
//!
//! Each pass sends one prompt and interprets the reply. A pass never fails:
//! an unreachable model or an unparseable reply degrades to a neutral
//! result and logs a warning, so one bad page does not sink a whole paper.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::extract::llm::TextGenerator;
use crate::model::ContentType;

/// Characters of text sent to the keyword pass.
const KEYWORD_SAMPLE_CHARS: usize = 4000;
/// Characters of text sent to the classifier.
const CLASSIFY_SAMPLE_CHARS: usize = 2000;
/// Keywords mentioned in the structured-extraction prompt.
const FOCUS_TERMS: usize = 10;

static CONTENT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(abstract|introduction|methods|results|discussion|conclusion|references|appendix|main)\b",
    )
    .unwrap()
});

/// Terms found by the keyword pass, grouped as the model reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordAnalysis {
    #[serde(default)]
    pub technical_keywords: Vec<String>,
    #[serde(default)]
    pub research_concepts: Vec<String>,
    #[serde(default)]
    pub chemical_compounds: Vec<String>,
    #[serde(default)]
    pub methodologies: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

impl KeywordAnalysis {
    /// Every term across all groups, first occurrence kept, compared
    /// case-insensitively.
    pub fn all_keywords(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        [
            &self.technical_keywords,
            &self.research_concepts,
            &self.chemical_compounds,
            &self.methodologies,
            &self.equipment,
        ]
        .into_iter()
        .flatten()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
        .map(str::to_string)
        .collect()
    }
}

/// Prefix of `text` holding at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The JSON object embedded in a model reply, if any.
///
/// Models like to wrap JSON in prose or code fences; take the span from the
/// first `{` to the last `}`.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn ask(generator: &dyn TextGenerator, pass: &str, prompt: &str, system: &str) -> Option<String> {
    match generator.generate(prompt, Some(system), 0.1) {
        Ok(reply) if !reply.trim().is_empty() => Some(reply),
        Ok(_) => {
            tracing::warn!(pass, "model returned an empty reply, using fallback");
            None
        }
        Err(e) => {
            tracing::warn!(pass, error = %e, "model request failed, using fallback");
            None
        }
    }
}

/// Keyword and concept extraction over a sample of the paper.
pub fn extract_keywords_and_concepts(generator: &dyn TextGenerator, text: &str) -> KeywordAnalysis {
    let system = "You are an academic researcher who extracts keywords and key concepts \
                  from scientific papers with high precision.";
    let prompt = format!(
        "Analyze the academic text below and list:\n\
         1. technical_keywords: specific technical terms, methods, materials\n\
         2. research_concepts: broader research concepts and themes\n\
         3. chemical_compounds: chemical formulas and compound names\n\
         4. methodologies: research methods and analytical techniques\n\
         5. equipment: instruments and analytical equipment\n\n\
         Text:\n{}\n\n\
         Answer with a single JSON object with exactly these five keys, each \
         holding an array of strings. Keep only the most important terms.",
        truncate_chars(text, KEYWORD_SAMPLE_CHARS)
    );

    let Some(reply) = ask(generator, "keywords", &prompt, system) else {
        return KeywordAnalysis::default();
    };
    match extract_json_object(&reply).map(serde_json::from_str::<KeywordAnalysis>) {
        Some(Ok(analysis)) => analysis,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "could not parse keyword reply, using empty keyword set");
            KeywordAnalysis::default()
        }
        None => {
            tracing::warn!("keyword reply contained no JSON object, using empty keyword set");
            KeywordAnalysis::default()
        }
    }
}

/// Structural label for one page; [`ContentType::Main`] when unsure.
pub fn classify_content_type(
    generator: &dyn TextGenerator,
    text: &str,
    page_num: u32,
    total_pages: usize,
) -> ContentType {
    let system = "You analyze the structure of academic papers and label each page.";
    let labels: Vec<&str> = ContentType::ALL.iter().map(|ct| ct.as_str()).collect();
    let prompt = format!(
        "Classify this text from page {page_num} of {total_pages}.\n\n\
         Text:\n{}\n\n\
         Choose exactly one of: {}.\n\
         Use main for general content that fits no other label.\n\
         Reply with the label only.",
        truncate_chars(text, CLASSIFY_SAMPLE_CHARS),
        labels.join(", ")
    );

    let Some(reply) = ask(generator, "classify", &prompt, system) else {
        return ContentType::Main;
    };
    label_in_reply(&reply).unwrap_or_else(|| {
        tracing::warn!(page_num, reply = %truncate_chars(&reply, 80), "unrecognized content type, using main");
        ContentType::Main
    })
}

/// First known content-type label mentioned in a reply.
pub fn label_in_reply(reply: &str) -> Option<ContentType> {
    CONTENT_LABEL
        .find(reply)
        .and_then(|m| ContentType::from_label(m.as_str()))
}

/// Structured fields for a page, shaped by its content type.
///
/// Returns `{"extraction_error": ...}` when the reply cannot be parsed.
pub fn extract_structured_content(
    generator: &dyn TextGenerator,
    text: &str,
    content_type: ContentType,
    keywords: &[String],
) -> Value {
    let system = format!(
        "You are an academic researcher extracting structured information from the \
         {content_type} sections of scientific papers."
    );
    let focus = if keywords.is_empty() {
        String::new()
    } else {
        let terms: Vec<&str> = keywords.iter().take(FOCUS_TERMS).map(String::as_str).collect();
        format!("Key terms to focus on: {}\n\n", terms.join(", "))
    };
    let shape = match content_type {
        ContentType::Abstract => {
            r#"{"objective": "...", "methods": "...", "findings": "...", "significance": "..."}"#
        }
        ContentType::Methods => {
            r#"{"materials": ["..."], "equipment": ["..."], "procedures": ["..."], "conditions": "..."}"#
        }
        ContentType::Results => {
            r#"{"key_findings": ["..."], "data_types": ["..."], "measurements": ["..."], "performance": "..."}"#
        }
        _ => r#"{"main_points": ["..."], "key_terms": ["..."], "important_info": "..."}"#,
    };
    let prompt = format!(
        "Extract the key information from this {content_type} section:\n\n{text}\n\n\
         {focus}Reply with JSON shaped like:\n{shape}"
    );

    let parsed = ask(generator, "structured", &prompt, &system).and_then(|reply| {
        extract_json_object(&reply).and_then(|json| serde_json::from_str::<Value>(json).ok())
    });
    parsed.unwrap_or_else(|| {
        tracing::warn!(%content_type, "could not parse structured content");
        json!({"extraction_error": "Could not parse structured content"})
    })
}

/// Repair spacing damage from PDF text extraction.
///
/// Returns the input unchanged if the model gives nothing back.
pub fn fix_text_spacing(generator: &dyn TextGenerator, text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    let system = "You fix spacing and formatting problems in text extracted from PDFs.";
    let prompt = format!(
        "Fix the spacing and formatting of this academic text.\n\
         - split words that were run together\n\
         - join words broken across lines and drop the hyphen\n\
         - keep chemical formulas, citations and technical terms exactly as they are\n\
         - fix spacing around punctuation and keep paragraph breaks\n\
         - add nothing new\n\n\
         Text:\n{text}\n\n\
         Reply with the corrected text only."
    );
    ask(generator, "spacing", &prompt, system).unwrap_or_else(|| text.to_string())
}
