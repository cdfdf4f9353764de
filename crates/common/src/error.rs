use thiserror::Error;

use crate::{Basis, ConditionKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Price feed error: {0}")]
    Feed(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported condition: {kind} with basis {basis}")]
    UnsupportedCondition { kind: ConditionKind, basis: Basis },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
