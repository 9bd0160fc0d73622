//! Collaborator interfaces: the Pod API client and the readiness watcher
//!
//! Both are implemented outside this crate. Retry, backoff and rate limiting
//! belong to the API client; a missing resource is reported as a 404
//! [`ApiError`](operator_work::ApiError).

use async_trait::async_trait;
use operator_types::{Pod, TuningParameters};
use operator_work::{ApiResult, StepRef};
use std::sync::Arc;

/// Options for a Pod delete call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub grace_period_seconds: Option<u32>,
}

/// Remote Pod API
#[async_trait]
pub trait PodApi: Send + Sync {
    async fn read_pod(&self, name: &str, namespace: &str) -> ApiResult<Pod>;

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> ApiResult<Pod>;

    async fn delete_pod(&self, name: &str, namespace: &str, options: &DeleteOptions)
        -> ApiResult<()>;
}

/// Observes Pod status changes
pub trait PodWatcher: Send + Sync {
    /// A step that parks the chain until `pod` reports ready, then
    /// continues to `next`.
    fn wait_for_ready(&self, pod: &Pod, next: Option<StepRef>) -> StepRef;
}

/// Collaborators handed to every pod step
#[derive(Clone)]
pub struct PodServices {
    pub api: Arc<dyn PodApi>,
    pub watcher: Arc<dyn PodWatcher>,
    pub tuning: Arc<TuningParameters>,
}

impl PodServices {
    pub fn new(
        api: Arc<dyn PodApi>,
        watcher: Arc<dyn PodWatcher>,
        tuning: Arc<TuningParameters>,
    ) -> Self {
        Self {
            api,
            watcher,
            tuning,
        }
    }
}
