//! Error types for operator-scheduler

use operator_types::TypesError;
use operator_work::WorkError;
use thiserror::Error;

/// Errors raised while planning a scheduling pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A server chosen to run has an environment that cannot be prepared
    #[error("cannot prepare startup environment for server {server_name}: {source}")]
    StartupEnv {
        server_name: String,
        #[source]
        source: TypesError,
    },
}

impl From<SchedulerError> for WorkError {
    fn from(err: SchedulerError) -> Self {
        WorkError::step("managed-servers-up", err.to_string())
    }
}

/// Result type for operator-scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
