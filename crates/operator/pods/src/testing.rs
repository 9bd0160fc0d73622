//! In-memory collaborators for tests
//!
//! [`InMemoryPodApi`] behaves like a Pod API server: creates fill in the
//! server-populated fields, a create of an existing Pod is a conflict, and a
//! missing Pod is a 404. Every call is journaled, and failures can be queued
//! per operation.

use crate::api::{DeleteOptions, PodApi, PodWatcher};
use async_trait::async_trait;
use dashmap::DashMap;
use operator_types::Pod;
use operator_work::{ApiError, ApiResult, NextAction, Packet, Resumption, Step, StepRef};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kind of Pod API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    Read,
    Create,
    Delete,
}

/// One journaled call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub op: ApiOp,
    pub namespace: String,
    pub name: String,
}

type DeleteObserver = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Pod API backed by a map
#[derive(Default)]
pub struct InMemoryPodApi {
    pods: DashMap<(String, String), Pod>,
    calls: Mutex<Vec<ApiCall>>,
    faults: Mutex<HashMap<ApiOp, VecDeque<ApiError>>>,
    delete_observer: Mutex<Option<DeleteObserver>>,
    resource_version: AtomicU64,
}

impl InMemoryPodApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a Pod without journaling a call.
    pub fn insert_pod(&self, pod: Pod) {
        let key = (pod.namespace().to_string(), pod.name().to_string());
        self.pods.insert(key, pod);
    }

    pub fn pod(&self, name: &str, namespace: &str) -> Option<Pod> {
        self.pods
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Names of the stored Pods, sorted.
    pub fn pod_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pods.iter().map(|e| e.key().1.clone()).collect();
        names.sort();
        names
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    pub fn ops(&self) -> Vec<ApiOp> {
        self.calls.lock().iter().map(|c| c.op).collect()
    }

    pub fn count(&self, op: ApiOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Fail the next call of kind `op` with `error`.
    pub fn fail_next(&self, op: ApiOp, error: ApiError) {
        self.faults.lock().entry(op).or_default().push_back(error);
    }

    /// Call `observer(name, namespace)` before every delete is applied.
    pub fn on_delete<F>(&self, observer: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        *self.delete_observer.lock() = Some(Arc::new(observer));
    }

    fn record(&self, op: ApiOp, name: &str, namespace: &str) -> ApiResult<()> {
        self.calls.lock().push(ApiCall {
            op,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        match self.faults.lock().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PodApi for InMemoryPodApi {
    async fn read_pod(&self, name: &str, namespace: &str) -> ApiResult<Pod> {
        self.record(ApiOp::Read, name, namespace)?;
        self.pod(name, namespace)
            .ok_or_else(|| ApiError::not_found(format!("pods \"{name}\" not found")))
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> ApiResult<Pod> {
        self.record(ApiOp::Create, pod.name(), namespace)?;

        let key = (namespace.to_string(), pod.name().to_string());
        if self.pods.contains_key(&key) {
            return Err(ApiError::conflict(format!(
                "pods \"{}\" already exists",
                pod.name()
            )));
        }

        let version = self.resource_version.fetch_add(1, Ordering::SeqCst) + 1;
        let mut created = pod.clone();
        created.metadata.namespace = namespace.to_string();
        created.metadata.uid = Some(format!("uid-{version}"));
        created.metadata.resource_version = Some(version.to_string());
        created.metadata.creation_timestamp = Some(chrono::Utc::now());
        created.spec.node_name = Some("node-1".into());
        for container in &mut created.spec.containers {
            container
                .termination_message_path
                .get_or_insert_with(|| "/dev/termination-log".into());
        }

        self.pods.insert(key, created.clone());
        Ok(created)
    }

    async fn delete_pod(
        &self,
        name: &str,
        namespace: &str,
        _options: &DeleteOptions,
    ) -> ApiResult<()> {
        self.record(ApiOp::Delete, name, namespace)?;

        let observer = self.delete_observer.lock().clone();
        if let Some(observer) = observer {
            observer(name, namespace);
        }

        self.pods
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("pods \"{name}\" not found")))
    }
}

/// Watcher whose Pods are ready as soon as they are created
#[derive(Debug, Default)]
pub struct ImmediateReadyWatcher {
    waited: Arc<Mutex<Vec<String>>>,
}

impl ImmediateReadyWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pod names waited on, in order.
    pub fn waited(&self) -> Vec<String> {
        self.waited.lock().clone()
    }
}

impl PodWatcher for ImmediateReadyWatcher {
    fn wait_for_ready(&self, pod: &Pod, next: Option<StepRef>) -> StepRef {
        Arc::new(ReadyStep {
            pod_name: pod.name().to_string(),
            waited: self.waited.clone(),
            next,
        })
    }
}

struct ReadyStep {
    pod_name: String,
    waited: Arc<Mutex<Vec<String>>>,
    next: Option<StepRef>,
}

impl Step for ReadyStep {
    fn name(&self) -> &str {
        "wait-for-ready"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, _packet: &mut Packet) -> operator_work::Result<NextAction> {
        self.waited.lock().push(self.pod_name.clone());
        let next = self.next.clone();
        Ok(NextAction::suspend(async move {
            tokio::task::yield_now().await;
            Resumption::proceed(next)
        }))
    }
}
