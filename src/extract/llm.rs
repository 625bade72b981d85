//! Ollama client used by the extraction passes.
//!
//! The model is only ever asked for single-shot completions. The
//! [`TextGenerator`] trait is the seam between the analysis passes and the
//! transport, so passes can run against canned replies.

use std::time::Duration;

use miette::Diagnostic;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("Ollama is not available at {url}")]
    #[diagnostic(
        code(scixtract::llm::unavailable),
        help("Start Ollama with `ollama serve`, or point [ollama] base_url / OLLAMA_BASE_URL at a running server.")
    )]
    Unavailable { url: String },

    #[error("model \"{model}\" is not installed on the Ollama server")]
    #[diagnostic(
        code(scixtract::llm::model_missing),
        help("Pull it with `scixtract setup --model {model}` or `ollama pull {model}`.")
    )]
    ModelMissing { model: String },

    #[error("failed to pull model \"{model}\": {message}")]
    #[diagnostic(
        code(scixtract::llm::model_pull),
        help("Check your internet connection or manually run: ollama pull {model}")
    )]
    ModelPull { model: String, message: String },

    #[error("Ollama request failed: {message}")]
    #[diagnostic(
        code(scixtract::llm::request_failed),
        help("Check that Ollama is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse Ollama response: {message}")]
    #[diagnostic(
        code(scixtract::llm::parse_error),
        help("The server returned an unexpected response format.")
    )]
    ParseError { message: String },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Model downloads can take many minutes.
const PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// Configuration for the Ollama client.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Default sampling temperature.
    pub temperature: f64,
    pub top_p: f64,
    /// Context window size requested from the server.
    pub num_ctx: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
            temperature: 0.1,
            top_p: 0.9,
            num_ctx: 8192,
        }
    }
}

/// Anything that turns a prompt into text.
pub trait TextGenerator {
    /// Single completion for `prompt` with an optional system prompt.
    fn generate(&self, prompt: &str, system: Option<&str>, temperature: f64) -> LlmResult<String>;

    /// Name of the model behind the generator.
    fn model(&self) -> &str;
}

/// Client for the Ollama REST API.
pub struct OllamaClient {
    config: OllamaConfig,
    available: bool,
    /// Models available locally after `probe()`.
    available_models: Vec<String>,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            available: false,
            available_models: Vec::new(),
        }
    }

    /// Ask `/api/tags` whether the server is up and which models it has.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();

        match agent.get(&url).call() {
            Ok(resp) if resp.status() == 200 => {
                self.available = true;
                self.available_models = resp
                    .into_json::<Value>()
                    .map(|json| model_names(&json))
                    .unwrap_or_default();
                tracing::debug!(
                    url = %self.config.base_url,
                    models = self.available_models.len(),
                    "ollama reachable"
                );
                true
            }
            _ => {
                self.available = false;
                self.available_models.clear();
                false
            }
        }
    }

    /// Whether the configured model is installed (with or without a tag).
    pub fn has_model(&self) -> bool {
        let target = &self.config.model;
        self.available_models
            .iter()
            .any(|m| m == target || m.split(':').next() == Some(target.as_str()))
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Probe the server and fail unless the configured model is usable.
    pub fn ensure_ready(&mut self) -> LlmResult<()> {
        if !self.probe() {
            return Err(LlmError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }
        if !self.has_model() {
            return Err(LlmError::ModelMissing {
                model: self.config.model.clone(),
            });
        }
        Ok(())
    }

    /// Ensure the configured model is installed, pulling it if necessary.
    ///
    /// Call after `probe()` has returned true.
    pub fn ensure_model(&mut self) -> LlmResult<()> {
        if !self.available {
            return Err(LlmError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }
        if self.has_model() {
            return Ok(());
        }
        self.pull_model()
    }

    /// Download the configured model through `/api/pull`, then re-probe.
    pub fn pull_model(&mut self) -> LlmResult<()> {
        if !self.available {
            return Err(LlmError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        tracing::info!(model = %self.config.model, "pulling model, this may take a few minutes");
        let url = format!("{}/api/pull", self.config.base_url);
        let agent = ureq::AgentBuilder::new().timeout(PULL_TIMEOUT).build();

        let resp = agent
            .post(&url)
            .send_json(self.pull_body())
            .map_err(|e| LlmError::ModelPull {
                model: self.config.model.clone(),
                message: e.to_string(),
            })?;

        if resp.status() != 200 {
            return Err(LlmError::ModelPull {
                model: self.config.model.clone(),
                message: format!("server returned status {}", resp.status()),
            });
        }
        self.probe();
        if self.has_model() {
            Ok(())
        } else {
            Err(LlmError::ModelPull {
                model: self.config.model.clone(),
                message: "model still missing after pull".into(),
            })
        }
    }

    /// Models reported by the last successful `probe()`.
    pub fn installed_models(&self) -> &[String] {
        &self.available_models
    }

    /// Switch to another model; the installed list stays as probed.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.model = model.into();
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn pull_body(&self) -> Value {
        json!({
            "name": self.config.model,
            "stream": false,
        })
    }

    fn request_body(&self, prompt: &str, system: Option<&str>, temperature: f64) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": temperature,
                "top_p": self.config.top_p,
                "num_ctx": self.config.num_ctx,
            },
        });
        if let Some(sys) = system {
            body["system"] = Value::String(sys.to_string());
        }
        body
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, prompt: &str, system: Option<&str>, temperature: f64) -> LlmResult<String> {
        if !self.available {
            return Err(LlmError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build();

        let resp = agent
            .post(&url)
            .send_json(self.request_body(prompt, system, temperature))
            .map_err(|e| LlmError::RequestFailed {
                message: e.to_string(),
            })?;

        let json: Value = resp.into_json().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        json["response"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("available", &self.available)
            .finish()
    }
}

fn model_names(tags: &Value) -> Vec<String> {
    tags["models"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|m| m["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
