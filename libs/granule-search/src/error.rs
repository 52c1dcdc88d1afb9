//! Error types for granule-search

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Granule search errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown search parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Expected finite numeric value: {0}")]
    NonFinite(String),

    #[error("Invalid parameter value: {0}")]
    InvalidValue(String),

    #[error("HTTP {status}: {message}")]
    ClientRequest { status: u16, message: String },

    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Errors raised while validating search parameters, before any request is made.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownParameter(_)
                | Self::InvalidRange(_)
                | Self::NonFinite(_)
                | Self::InvalidValue(_)
                | Self::Config(_)
        )
    }

    /// HTTP status reported by the catalog, if this error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientRequest { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
