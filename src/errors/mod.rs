//! Error handling module for the shared drive admin tool.
//!
//! Provides the crate-wide error type plus the gateway error taxonomy that separates
//! retryable from terminal REST failures.

use thiserror::Error;

use crate::store::SnapshotKind;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const GATEWAY_RETRYABLE: &str = "GATEWAY_RETRYABLE";
    pub const GATEWAY_TERMINAL: &str = "GATEWAY_TERMINAL";
    pub const STALE_SNAPSHOT: &str = "STALE_SNAPSHOT";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INTERRUPTED: &str = "INTERRUPTED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const JSON_ERROR: &str = "JSON_ERROR";
    pub const CREDENTIALS_ERROR: &str = "CREDENTIALS_ERROR";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
}

/// A failed call against the Drive or Directory API.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Rate limiting, 5xx, or a transport failure. Safe to retry.
    #[error("retryable gateway failure (status {status:?}): {message}")]
    Retryable {
        status: Option<u16>,
        message: String,
    },
    /// Bad request, not found, permission denied, or an undecodable body.
    #[error("gateway request failed (status {status:?}): {message}")]
    Terminal {
        status: Option<u16>,
        message: String,
    },
}

impl GatewayError {
    /// Classify an HTTP error response.
    ///
    /// `reason` is the first `error.errors[].reason` from the Google error envelope, which
    /// is how rate limiting shows up on 403 responses.
    pub fn from_status(status: u16, reason: Option<&str>, message: String) -> Self {
        let rate_limited = matches!(
            reason,
            Some("rateLimitExceeded" | "userRateLimitExceeded" | "quotaExceeded")
        );
        if status == 429 || status >= 500 || (status == 403 && rate_limited) {
            GatewayError::Retryable {
                status: Some(status),
                message,
            }
        } else {
            GatewayError::Terminal {
                status: Some(status),
                message,
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Retryable { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Retryable { status, .. } | GatewayError::Terminal { status, .. } => {
                *status
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_timeout() || err.is_connect() {
            GatewayError::Retryable {
                status,
                message: err.to_string(),
            }
        } else {
            GatewayError::Terminal {
                status,
                message: err.to_string(),
            }
        }
    }
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// A drive is listed in the drives snapshot but missing from the permissions snapshot.
    #[error(
        "drive {drive_id} is missing from the permissions snapshot; the cache is stale, run `drive-admin reload`"
    )]
    StaleSnapshot { drive_id: String },
    #[error("{0}")]
    Validation(String),
    /// Fetch cancelled by the user after persisting `persisted` items.
    #[error("interrupted while fetching {kind}; {persisted} item(s) were saved")]
    Interrupted { kind: SnapshotKind, persisted: usize },
    /// An uncached listing was cancelled after `received` items.
    #[error("interrupted while listing {listing}; only {received} arrived")]
    ListingInterrupted {
        listing: &'static str,
        received: usize,
    },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("malformed JSON: {0}")]
    Json(String),
    #[error("credentials error: {0}")]
    Credentials(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Gateway(e) if e.is_retryable() => codes::GATEWAY_RETRYABLE,
            AppError::Gateway(_) => codes::GATEWAY_TERMINAL,
            AppError::StaleSnapshot { .. } => codes::STALE_SNAPSHOT,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Interrupted { .. } | AppError::ListingInterrupted { .. } => {
                codes::INTERRUPTED
            }
            AppError::Storage(_) => codes::STORAGE_ERROR,
            AppError::Json(_) => codes::JSON_ERROR,
            AppError::Credentials(_) => codes::CREDENTIALS_ERROR,
            AppError::Config(_) => codes::CONFIG_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Storage(format!("database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Json(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}
