//! XDG-compliant path resolution for scixtract.
//!
//! `ScixPaths` holds the global config and data directories following the
//! XDG Base Directory Specification.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(scixtract::paths::no_home),
        help("Set the HOME environment variable, or pass --db and --config explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(scixtract::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

const APP_DIR: &str = "scixtract";

/// File name of the default knowledge index.
pub const DEFAULT_DB_FILE: &str = "knowledge_index.db";

/// Global XDG directories for scixtract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScixPaths {
    /// `$XDG_CONFIG_HOME/scixtract/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/scixtract/`
    pub data_dir: PathBuf,
}

impl ScixPaths {
    /// Resolve from the process environment.
    pub fn resolve() -> PathResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment variables.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> PathResult<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let home = var("HOME");

        let base = |xdg: &str, fallback: &str| -> PathResult<PathBuf> {
            match var(xdg) {
                Some(dir) => Ok(dir),
                None => home
                    .as_ref()
                    .map(|h| h.join(fallback))
                    .ok_or(PathError::NoHome),
            }
        };

        Ok(Self {
            config_dir: base("XDG_CONFIG_HOME", ".config")?.join(APP_DIR),
            data_dir: base("XDG_DATA_HOME", ".local/share")?.join(APP_DIR),
        })
    }

    /// `config.toml` inside the config directory.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Knowledge index used when nothing else names one.
    pub fn default_db_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_DB_FILE)
    }

    /// Create the config and data directories.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PathError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
