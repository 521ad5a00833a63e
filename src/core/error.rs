//! Error taxonomy shared by the ledger, registry and valuation engine.

use std::fmt::Display;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Price source failed: {0}")]
    UpstreamPrice(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn persistence(err: impl Display) -> Self {
        EngineError::Persistence(err.to_string())
    }

    pub fn upstream(err: impl Display) -> Self {
        EngineError::UpstreamPrice(err.to_string())
    }
}

impl From<fjall::Error> for EngineError {
    fn from(err: fjall::Error) -> Self {
        EngineError::persistence(err)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Persistence(format!("corrupt record: {err}"))
    }
}
