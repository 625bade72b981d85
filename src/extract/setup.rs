//! Ollama setup helpers: the models known to work for extraction and a
//! quick end-to-end check of a model.

use serde::Deserialize;

use crate::extract::analysis::extract_json_object;
use crate::extract::llm::{LlmResult, TextGenerator};

/// A model known to work for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendedModel {
    pub name: &'static str,
    /// Approximate download size.
    pub size: &'static str,
    pub description: &'static str,
    pub recommended: bool,
}

pub const RECOMMENDED_MODELS: &[RecommendedModel] = &[
    RecommendedModel {
        name: "qwen2.5:7b",
        size: "2.0GB",
        description: "Fast, efficient model for most academic papers",
        recommended: true,
    },
    RecommendedModel {
        name: "qwen2.5:32b-instruct-q4_K_M",
        size: "19GB",
        description: "Higher quality extraction for complex documents",
        recommended: true,
    },
    RecommendedModel {
        name: "qwen2:72b",
        size: "40GB",
        description: "Highest quality, needs substantial memory",
        recommended: false,
    },
    RecommendedModel {
        name: "mistral",
        size: "4.1GB",
        description: "Alternative general-purpose model",
        recommended: false,
    },
];

const CHECK_PROMPT: &str = "Extract keywords from this text: \"Catalytic conversion of nitrogen \
                            oxides to ammonia using electrochemical methods.\"\n\n\
                            Return JSON format: {\"keywords\": [\"keyword1\", \"keyword2\"]}";

/// Outcome of [`check_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCheck {
    /// The reply held a JSON keyword list.
    Keywords(Vec<String>),
    /// The model answered, but not with the requested JSON.
    Unstructured,
}

#[derive(Deserialize)]
struct KeywordReply {
    keywords: Vec<String>,
}

/// Ask the model for keywords of a fixed sentence.
///
/// Transport failures are errors; a reply without usable JSON still means
/// the model runs.
pub fn check_model(generator: &dyn TextGenerator) -> LlmResult<ModelCheck> {
    let reply = generator.generate(CHECK_PROMPT, None, 0.1)?;
    let parsed = extract_json_object(&reply)
        .and_then(|json| serde_json::from_str::<KeywordReply>(json).ok());
    Ok(match parsed {
        Some(reply) => ModelCheck::Keywords(reply.keywords),
        None => {
            tracing::warn!(model = generator.model(), "model reply was not keyword JSON");
            ModelCheck::Unstructured
        }
    })
}

/// Table entry for `name`, ignoring a `:latest` tag.
pub fn recommended(name: &str) -> Option<&'static RecommendedModel> {
    let name = name.strip_suffix(":latest").unwrap_or(name);
    RECOMMENDED_MODELS.iter().find(|m| m.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::llm::LlmError;

    struct Reply(&'static str);

    impl TextGenerator for Reply {
        fn generate(&self, prompt: &str, _: Option<&str>, _: f64) -> LlmResult<String> {
            assert!(prompt.contains("nitrogen oxides"));
            Ok(self.0.to_string())
        }
        fn model(&self) -> &str {
            "reply"
        }
    }

    struct Refused;

    impl TextGenerator for Refused {
        fn generate(&self, _: &str, _: Option<&str>, _: f64) -> LlmResult<String> {
            Err(LlmError::RequestFailed {
                message: "connection refused".into(),
            })
        }
        fn model(&self) -> &str {
            "refused"
        }
    }

    #[test]
    fn keyword_json_in_prose_is_found() {
        let check = check_model(&Reply(
            "Sure:\n```json\n{\"keywords\": [\"ammonia\", \"electrochemistry\"]}\n```",
        ))
        .unwrap();
        assert_eq!(
            check,
            ModelCheck::Keywords(vec!["ammonia".into(), "electrochemistry".into()])
        );
    }

    #[test]
    fn plain_text_reply_still_counts_as_working() {
        assert_eq!(
            check_model(&Reply("ammonia, nitrogen oxides")).unwrap(),
            ModelCheck::Unstructured
        );
        assert_eq!(
            check_model(&Reply("{\"terms\": [\"ammonia\"]}")).unwrap(),
            ModelCheck::Unstructured
        );
    }

    #[test]
    fn transport_failure_is_an_error() {
        assert!(matches!(
            check_model(&Refused),
            Err(LlmError::RequestFailed { .. })
        ));
    }

    #[test]
    fn recommended_lookup_ignores_latest_tag() {
        assert_eq!(recommended("mistral:latest").map(|m| m.size), Some("4.1GB"));
        assert!(recommended("qwen2.5:7b").is_some_and(|m| m.recommended));
        assert!(recommended("llama3.2").is_none());
        assert!(RECOMMENDED_MODELS.iter().any(|m| m.recommended));
    }
}
