//! Error types for operator-pods

use operator_types::TypesError;
use operator_work::{ApiError, WorkError};
use thiserror::Error;

/// Errors raised while building or reconciling server pods
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PodError {
    /// The desired pod could not be built from the domain configuration
    #[error("cannot build pod for server {server_name}: {source}")]
    DesiredState {
        server_name: String,
        #[source]
        source: TypesError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PodError {
    pub fn desired_state(server_name: impl Into<String>, source: TypesError) -> Self {
        PodError::DesiredState {
            server_name: server_name.into(),
            source,
        }
    }
}

impl From<PodError> for WorkError {
    fn from(err: PodError) -> Self {
        match err {
            PodError::Api(api) => WorkError::Api(api),
            PodError::DesiredState { .. } => WorkError::step("build-pod", err.to_string()),
        }
    }
}

/// Result type for operator-pods operations
pub type Result<T> = std::result::Result<T, PodError>;
