use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum RcaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Coarse error class carried on the wire so transports can pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Upstream,
    Unavailable,
    Internal,
}

impl RcaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RcaError::Validation(_) => ErrorKind::Validation,
            RcaError::NotFound(_) => ErrorKind::NotFound,
            RcaError::Llm(_) => ErrorKind::Upstream,
            RcaError::Unavailable(_) => ErrorKind::Unavailable,
            _ => ErrorKind::Internal,
        }
    }
}
