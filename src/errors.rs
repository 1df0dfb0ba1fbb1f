//! Error taxonomy shared by the engine and the worker surface.

use thiserror::Error;

/// Failures that abort a matching run.
///
/// Row-level data problems are not represented here: such rows are dropped
/// during validation and only show up in [`crate::domain::matching::MatchStats`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Non-positive `k`, missing required column or a bad command-line value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The embedding backend failed, timed out or answered with garbage.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type EngineResult<T> = Result<T, EngineError>;
