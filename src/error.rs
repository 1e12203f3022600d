//! Error types for the infuse data loading engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while resolving, loading, or storing path data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("{0}")]
    Resolver(String),

    #[error("No resolver could be found for '{0}'")]
    NotFound(String),

    #[error("Parent resolver could not be found for '{0}'")]
    ParentNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl LoadError {
    /// Wire code recorded in the shadow tree for this error
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::Timeout => "TIMEOUT",
            LoadError::Cancelled => "CANCELLED",
            LoadError::Resolver(_) => "RESOLVER_ERROR",
            LoadError::NotFound(_) => "NOT_FOUND",
            LoadError::ParentNotFound(_) => "PARENT_NOT_FOUND",
            LoadError::Config(_) => "CONFIG_ERROR",
            LoadError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}

impl From<config::ConfigError> for LoadError {
    fn from(err: config::ConfigError) -> Self {
        LoadError::Config(err.to_string())
    }
}

/// Error as recorded in a `LOAD_FAIL` event and in the shadow tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            message: message.into(),
            code: code.map(str::to_string),
        }
    }

    /// Build from an arbitrary resolver error.
    ///
    /// Errors that are (or wrap) a `LoadError` keep its wire code; anything
    /// else is a `RESOLVER_ERROR`.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .downcast_ref::<LoadError>()
            .map_or("RESOLVER_ERROR", LoadError::code);
        Self::new(err.to_string(), Some(code))
    }
}

impl From<&LoadError> for ErrorInfo {
    fn from(err: &LoadError) -> Self {
        ErrorInfo::new(err.to_string(), Some(err.code()))
    }
}
