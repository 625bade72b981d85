//! Top-level error type for scixtract.
//!
//! Each subsystem defines its own miette diagnostic enum next to the code
//! that raises it; [`ScixError`] wraps them without losing codes or help.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::extract::{ExtractError, LlmError};
use crate::knowledge::KnowledgeError;
use crate::model::RecordError;
use crate::paths::PathError;

#[derive(Debug, Error, Diagnostic)]
pub enum ScixError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Paths(#[from] PathError),
}

pub type ScixResult<T> = std::result::Result<T, ScixError>;
