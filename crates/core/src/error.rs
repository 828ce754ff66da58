//! Unified error types for the pipeline.
//!
//! Each kind maps to the place it is handled in the worker loop:
//! - QUEUE_001: queue or store unreachable, retried at the pop site
//! - VALID_001: malformed queue payload, dropped
//! - ENRICH_001: unexpected event shape, rerouted to the DLQ
//! - DB_001: transactional failure, whole batch rerouted to the DLQ
//! - DLQ_001: DLQ unreachable, payloads logged as lost

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification used for handling decisions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Validation,
    Enrichment,
    Persistence,
    DeadLetter,
    Config,
    Serialization,
}

impl ErrorKind {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport => "QUEUE_001",
            Self::Validation => "VALID_001",
            Self::Enrichment => "ENRICH_001",
            Self::Persistence => "DB_001",
            Self::DeadLetter => "DLQ_001",
            Self::Config => "CONFIG_001",
            Self::Serialization => "SERDE_001",
        }
    }
}

/// Unified error type for the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("enrichment error: {0}")]
    Enrichment(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("dead-letter write error: {0}")]
    DeadLetter(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn enrichment(msg: impl Into<String>) -> Self {
        Self::Enrichment(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn dead_letter(msg: impl Into<String>) -> Self {
        Self::DeadLetter(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Enrichment(_) => ErrorKind::Enrichment,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::DeadLetter(_) => ErrorKind::DeadLetter,
            Self::Config(_) => ErrorKind::Config,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}
