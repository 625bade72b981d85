//! Application configuration.
//!
//! Loaded from TOML, then overridden by environment variables. Every field
//! has a default, so an empty or missing file is a valid configuration.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::llm::OllamaConfig;
use crate::extract::report::ReportOptions;
use crate::knowledge::IngestConfig;
use crate::knowledge::context::DEFAULT_CONTEXT_WINDOW;
use crate::knowledge::query::{DEFAULT_RELATED_LIMIT, DEFAULT_SEARCH_LIMIT};
use crate::paths::ScixPaths;

/// Errors from loading or writing configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    #[diagnostic(
        code(scixtract::config::not_found),
        help("Create one with `scixtract config init --output {path}` or drop --config.")
    )]
    NotFound { path: String },

    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(scixtract::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {message}")]
    #[diagnostic(
        code(scixtract::config::parse),
        help("The file must be TOML with optional [ollama], [extraction] and [knowledge] tables.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(scixtract::config::write),
        help("Check that the directory exists and is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to overwrite existing config file: {path}")]
    #[diagnostic(
        code(scixtract::config::exists),
        help("Remove the file first or choose another --output path.")
    )]
    Exists { path: String },

    #[error("failed to serialize config: {message}")]
    #[diagnostic(code(scixtract::config::serialize))]
    Serialize { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `[ollama]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f64 {
    0.1
}
fn default_top_p() -> f64 {
    0.9
}
fn default_num_ctx() -> u32 {
    8192
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            num_ctx: default_num_ctx(),
        }
    }
}

/// `[extraction]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Index each result right after extraction.
    #[serde(default = "default_true")]
    pub update_knowledge: bool,
    #[serde(default = "default_true")]
    pub save_markdown: bool,
    #[serde(default = "default_true")]
    pub save_keywords: bool,
    /// Context snippet window in characters.
    #[serde(default = "default_context_length")]
    pub context_length: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("ai_extractions")
}
fn default_true() -> bool {
    true
}
fn default_context_length() -> usize {
    DEFAULT_CONTEXT_WINDOW
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            update_knowledge: true,
            save_markdown: true,
            save_keywords: true,
            context_length: default_context_length(),
        }
    }
}

/// `[knowledge]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSection {
    /// Index file; the XDG data directory is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    #[serde(default = "default_max_related")]
    pub max_related: usize,
}

fn default_max_search_results() -> usize {
    DEFAULT_SEARCH_LIMIT
}
fn default_max_related() -> usize {
    DEFAULT_RELATED_LIMIT
}

impl Default for KnowledgeSection {
    fn default() -> Self {
        Self {
            db_path: None,
            max_search_results: default_max_search_results(),
            max_related: default_max_related(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ollama: OllamaSection,
    #[serde(default)]
    pub extraction: ExtractionSection,
    #[serde(default)]
    pub knowledge: KnowledgeSection,
}

const EXAMPLE_TOML: &str = r#"# scixtract configuration
#
# Environment variables override these values:
#   OLLAMA_BASE_URL, OLLAMA_MODEL, OLLAMA_TIMEOUT, OLLAMA_TEMPERATURE,
#   SCIXTRACT_OUTPUT_DIR, SCIXTRACT_UPDATE_KNOWLEDGE, SCIXTRACT_KNOWLEDGE_DB

[ollama]
base_url = "http://localhost:11434"
model = "llama3.2"
timeout_secs = 120
temperature = 0.1
top_p = 0.9
num_ctx = 8192

[extraction]
output_dir = "ai_extractions"
update_knowledge = true
save_markdown = true
save_keywords = true
# Characters of page text kept around each keyword match.
context_length = 200

[knowledge]
# Defaults to $XDG_DATA_HOME/scixtract/knowledge_index.db
# db_path = "knowledge_index.db"
max_search_results = 20
max_related = 10
"#;

impl AppConfig {
    /// Parse TOML; `origin` names the source in errors.
    pub fn from_toml_str(text: &str, origin: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            message: e.to_string(),
        })
    }

    /// Read a config file.
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Load the effective configuration.
    ///
    /// `explicit` must exist if given. Otherwise the first existing file of
    /// [`candidate_files`] is used, or the defaults if there is none.
    /// Environment overrides are applied last. Returns the file used, if any.
    pub fn load(
        explicit: Option<&Path>,
        paths: Option<&ScixPaths>,
    ) -> ConfigResult<(Self, Option<PathBuf>)> {
        let (mut config, source) = Self::load_from(explicit, &candidate_files(paths))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok((config, source))
    }

    /// File-only part of [`AppConfig::load`].
    pub fn load_from(
        explicit: Option<&Path>,
        candidates: &[PathBuf],
    ) -> ConfigResult<(Self, Option<PathBuf>)> {
        let source = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                });
            }
            Some(path) => Some(path.to_path_buf()),
            None => candidates.iter().find(|p| p.is_file()).cloned(),
        };

        match source {
            Some(path) => {
                let config = Self::load_file(&path)?;
                tracing::info!(path = %path.display(), "loaded config");
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Apply environment overrides, reading variables through `lookup`.
    ///
    /// `SCIXTRACT_KNOWLEDGE_DB` only fills in a `db_path` the file left
    /// unset. Values that do not parse are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = var("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Some(model) = var("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(raw) = var("OLLAMA_TIMEOUT") {
            match raw.parse() {
                Ok(secs) => self.ollama.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid OLLAMA_TIMEOUT"),
            }
        }
        if let Some(raw) = var("OLLAMA_TEMPERATURE") {
            match raw.parse::<f64>() {
                Ok(t) if t.is_finite() => self.ollama.temperature = t,
                _ => tracing::warn!(value = %raw, "ignoring invalid OLLAMA_TEMPERATURE"),
            }
        }
        if let Some(dir) = var("SCIXTRACT_OUTPUT_DIR") {
            self.extraction.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var("SCIXTRACT_UPDATE_KNOWLEDGE") {
            match parse_flag(&raw) {
                Some(flag) => self.extraction.update_knowledge = flag,
                None => tracing::warn!(value = %raw, "ignoring invalid SCIXTRACT_UPDATE_KNOWLEDGE"),
            }
        }
        if self.knowledge.db_path.is_none() {
            self.knowledge.db_path = var("SCIXTRACT_KNOWLEDGE_DB").map(PathBuf::from);
        }
    }

    /// Index path: `flag` if given, then the configured path, then the XDG
    /// default.
    pub fn resolve_db_path(&self, flag: Option<&Path>, paths: Option<&ScixPaths>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.knowledge.db_path.clone())
            .or_else(|| paths.map(ScixPaths::default_db_path))
            .unwrap_or_else(|| PathBuf::from(crate::paths::DEFAULT_DB_FILE))
    }

    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.ollama.base_url.trim_end_matches('/').to_string(),
            model: self.ollama.model.clone(),
            timeout_secs: self.ollama.timeout_secs,
            temperature: self.ollama.temperature,
            top_p: self.ollama.top_p,
            num_ctx: self.ollama.num_ctx,
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            context_window: self.extraction.context_length,
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            markdown: self.extraction.save_markdown,
            keywords: self.extraction.save_keywords,
        }
    }

    /// Commented example file written by `config init`.
    pub fn example_toml() -> &'static str {
        EXAMPLE_TOML
    }

    /// Write the example file to `path`, never overwriting.
    pub fn write_example(path: &Path) -> ConfigResult<()> {
        if path.exists() {
            return Err(ConfigError::Exists {
                path: path.display().to_string(),
            });
        }
        let write_err = |source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, EXAMPLE_TOML).map_err(write_err)
    }
}

/// Config files searched when none is given explicitly, in order.
pub fn candidate_files(paths: Option<&ScixPaths>) -> Vec<PathBuf> {
    let mut files = vec![
        PathBuf::from("scixtract.toml"),
        PathBuf::from(".scixtract.toml"),
    ];
    if let Some(paths) = paths {
        files.push(paths.config_file());
    }
    files
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
