//! Unified Error Type System
//!
//! Centralized error types for the entire pipeline.
//! Provides status-based classification for retry decisions in the API
//! client and severity routing in the stages.
//!
//! ## Design Principles
//!
//! - Single unified error type (SyncError) for the entire application
//! - Category-based routing for retry decisions
//! - Entity-level errors are caught and counted by stages; only run-level
//!   errors propagate to the process exit code

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Categories for upstream HTTP failures, used by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// HTTP 429 - wait a rate-aware delay, then retry
    RateLimit,
    /// HTTP 5xx - transient server issue, retry with backoff
    Transient,
    /// Connection/timeout failures - retry with backoff
    Network,
    /// HTTP 401/403 - fail fast, don't retry
    Auth,
    /// Other 4xx - request is wrong, don't retry
    Client,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Network => write!(f, "NETWORK"),
            Self::Auth => write!(f, "AUTH"),
            Self::Client => write!(f, "CLIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Transient | Self::Network)
    }

    /// Base delay before the next attempt. Rate limits get a much longer
    /// wait than ordinary server hiccups.
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Transient => Duration::from_secs(2),
            Self::Network => Duration::from_secs(5),
            _ => Duration::from_millis(500),
        }
    }

    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            401 | 403 => Self::Auth,
            400..=499 => Self::Client,
            500..=599 => Self::Transient,
            _ => Self::Unknown,
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Upstream API Errors
    // -------------------------------------------------------------------------
    /// Non-success HTTP status from the upstream API.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Retries exhausted against the upstream API. Callers treat this as
    /// non-fatal for the overall run except during a startup health check.
    #[error("Upstream unavailable after {attempts} attempts for '{endpoint}': {message}")]
    UpstreamUnavailable {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// Malformed or unparseable document (XML text version).
    #[error("Document error: {0}")]
    Document(String),

    /// AI provider call failed (transport or provider-side error).
    #[error("AI provider error: {0}")]
    Provider(String),

    /// AI response failed schema validation.
    #[error("AI response validation failed: {0}")]
    AiResponse(String),

    /// Payload shape or content failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity missing from the relational store.
    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Infrastructure Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Create an upstream error from a status code and body.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Category of this error for retry decisions, when applicable.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Upstream { status, .. } => ErrorCategory::from_status(*status),
            Self::Http(e) if e.is_timeout() || e.is_connect() => ErrorCategory::Network,
            Self::Http(_) => ErrorCategory::Network,
            Self::UpstreamUnavailable { .. } => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Run-level errors abort the whole process; everything else is an
    /// entity-level error counted by the owning stage.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Upstream { status, .. } => {
                ErrorCategory::from_status(*status) == ErrorCategory::Auth
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

// =============================================================================
// Context Extension
// =============================================================================

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| SyncError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| SyncError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Client.is_retryable());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::RateLimit);
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::Client);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Transient);
    }

    #[test]
    fn test_rate_limit_delay_exceeds_transient() {
        assert!(
            ErrorCategory::RateLimit.recommended_delay()
                > ErrorCategory::Transient.recommended_delay()
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(SyncError::Config("missing api key".into()).is_fatal());
        assert!(SyncError::upstream(403, "forbidden").is_fatal());
        assert!(!SyncError::upstream(500, "oops").is_fatal());
        assert!(!SyncError::Validation("bad shape".into()).is_fatal());
    }

    #[test]
    fn test_with_context() {
        let r: std::result::Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let err = r.with_context("writing raw file").unwrap_err();
        assert!(err.to_string().contains("writing raw file"));
    }
}
