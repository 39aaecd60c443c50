//! Error types for the Courier domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! None of these ever escape the top-level pipeline: every variant can be
//! rendered as a user-readable message and appended to the conversation.

use thiserror::Error;

/// The top-level error type for all Courier operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller input ---
    #[error("Validation error: {0}")]
    Validation(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Completion backend ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retrieval backend ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Text suitable for an assistant-visible message in the conversation.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(detail) => format!("Request rejected: {detail}"),
            Error::Config { message } => format!("Courier is not fully configured.\n\n{message}"),
            other => format!("Request failed: {other}"),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Search request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Search backend not configured: {0}")]
    NotConfigured(String),

    #[error("Access token unavailable: {0}")]
    Credential(String),

    #[error("Search timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed search response: {0}")]
    Malformed(String),
}
