// src/error.rs

//! Unified error handling for the catalog crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A page or payload could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },
}

/// Why a fetch produced no data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The server answered 404. Never retried.
    #[error("no data at {url} (404)")]
    NotFound { url: String },

    /// Every attempt failed with a retryable status or transport error.
    #[error("gave up on {url} after {attempts} attempts (last status {last_status:?}): {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
        last_error: String,
    },

    /// The run was interrupted before the request was issued.
    #[error("fetch of {url} cancelled")]
    Cancelled { url: String },
}

impl FetchFailure {
    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Exhausted { last_status, .. } => *last_status,
            Self::Cancelled { .. } => None,
        }
    }
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
