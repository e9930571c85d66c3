//! Error taxonomy shared by every operation.
//!
//! Validation failures are raised before any network call. Everything else
//! originates in the dispatcher.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use thiserror::Error;

/// Errors that can occur when talking to the Evolution API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvolutionError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Endpoint not found: {endpoint}")]
    NotFound { endpoint: String },

    #[error("Timeout executing {method} {endpoint}")]
    Timeout { method: String, endpoint: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{}", format_api_error(.status, .body))]
    Api { status: Option<u16>, body: String },
}

fn format_api_error(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, body),
        None => format!("Request failed: {}", body),
    }
}

pub type Result<T> = std::result::Result<T, EvolutionError>;

impl EvolutionError {
    /// Stable machine-readable code (used by the daemon protocol).
    pub fn code(&self) -> &'static str {
        match self {
            EvolutionError::InvalidInput(_) => "INVALID_INPUT",
            EvolutionError::Authentication(_) => "AUTHENTICATION",
            EvolutionError::NotFound { .. } => "NOT_FOUND",
            EvolutionError::Timeout { .. } => "TIMEOUT",
            EvolutionError::Connection(_) => "CONNECTION",
            EvolutionError::Api { .. } => "API_ERROR",
        }
    }

    /// True for pre-flight failures raised before any request was issued.
    pub fn is_validation(&self) -> bool {
        matches!(self, EvolutionError::InvalidInput(_))
    }

    /// HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EvolutionError::Authentication(_) => Some(401),
            EvolutionError::NotFound { .. } => Some(404),
            EvolutionError::Api { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EvolutionError::InvalidInput(message.into())
    }
}
