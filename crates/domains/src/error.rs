//! # CoreError
//!
//! Centralized error taxonomy for the tutorlink core.
//! Every component returns these tagged failures instead of raw store errors.

use thiserror::Error;

/// The primary error type for all core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Referenced entity absent (e.g., user, post, report)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Bad input shape or range (e.g., empty title, too many time slots)
    #[error("validation error: {0}")]
    Validation(String),

    /// Actor lacks the required role or ownership
    #[error("unauthorized: {0}")]
    Authorization(String),

    /// Actor targets themselves where that is disallowed
    #[error("self-action not allowed: {0}")]
    SelfAction(String),

    /// Operation illegal for the entity's current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Transient infrastructure failure; the only kind eligible for retry
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CoreError {
    /// Whether a caller may retry the failed operation.
    ///
    /// Only transient store failures qualify; every other kind is terminal
    /// for that call and must be surfaced, not resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        CoreError::NotFound(kind.to_string(), id.to_string())
    }
}

/// A specialized Result type for tutorlink core logic.
pub type Result<T> = std::result::Result<T, CoreError>;
