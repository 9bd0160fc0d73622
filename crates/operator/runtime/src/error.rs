//! Error types for operator-runtime

use operator_types::TypesError;
use operator_work::WorkError;
use thiserror::Error;

/// Errors surfaced to the controller loop
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The domain resource failed validation; nothing was reconciled
    #[error("invalid domain {domain_uid}: {source}")]
    InvalidDomain {
        domain_uid: String,
        #[source]
        source: TypesError,
    },

    #[error("reconciliation failed: {0}")]
    Work(#[from] WorkError),
}

/// Result type for operator-runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
