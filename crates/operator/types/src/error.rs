//! Error types for operator-types.

use thiserror::Error;

/// Errors raised while validating or resolving domain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("domain UID cannot be empty")]
    EmptyDomainUid,

    #[error("admin server name cannot be empty")]
    EmptyAdminServerName,

    #[error("invalid domain spec: {0}")]
    InvalidSpec(String),

    /// A clustered server resolved without a cluster. Every clustered role
    /// must name a concrete cluster, so this is a programming error.
    #[error("clustered server {server_name} has no cluster name")]
    MissingClusterName { server_name: String },

    /// Rewriting an env var that references another source would change the
    /// shared value for every other consumer of that reference.
    #[error("environment variable {name} is a reference to another value and cannot be rewritten")]
    AliasedEnvVar { name: String },
}

/// Result type for operator-types operations
pub type Result<T> = std::result::Result<T, TypesError>;
