//! Error types for the gateway
//!
//! One taxonomy, explicit policy per kind. The policy is enforced at call
//! sites, never by a blanket catch:
//!
//! - `Validation` — caller input invalid, surfaced as HTTP 400, not retried
//! - `Store` — record-store transport/HTTP failure during reconciliation;
//!   callers choose abort (500) or degrade (sentinel identifiers) via
//!   `Args::store_error_policy`
//! - `Propagation` — store write failure after reconciliation; logged, the
//!   request still succeeds
//! - `Sync` — CRM failure; logged per field, a partial sync is a terminal
//!   state, not a rollback trigger
//! - `Report` — fire-and-forget; logged, never affects the response

use hyper::StatusCode;

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Propagation error: {0}")]
    Propagation(String),

    #[error("CRM sync error: {0}")]
    Sync(String),

    #[error("Report generation error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Propagation(_) => StatusCode::BAD_GATEWAY,
            Self::Sync(_) => StatusCode::BAD_GATEWAY,
            Self::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Http(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result type alias using GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;
