//! Error types for operator-work

use std::collections::BTreeMap;
use thiserror::Error;

/// HTTP status for a missing resource
pub const NOT_FOUND: u16 = 404;

/// HTTP status for a write conflict or stale resource version
pub const CONFLICT: u16 = 409;

/// Failure reported by a remote API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API call failed with status {status_code}: {message}")]
pub struct ApiError {
    pub status_code: u16,
    pub message: String,
    pub headers: BTreeMap<String, Vec<String>>,
}

impl ApiError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CONFLICT, message)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == NOT_FOUND
    }

    pub fn is_conflict(&self) -> bool {
        self.status_code == CONFLICT
    }
}

/// Errors that end a fiber
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("packet has no value for key {0}")]
    MissingPacketValue(String),

    #[error("packet value for key {key} is not a {expected}")]
    PacketTypeMismatch { key: String, expected: &'static str },

    /// A step hit a condition it cannot recover from
    #[error("step {step} failed: {message}")]
    Step { step: String, message: String },
}

impl WorkError {
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        WorkError::Step {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Result type for operator-work operations
pub type Result<T> = std::result::Result<T, WorkError>;
