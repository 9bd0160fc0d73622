//! Cycle protocol and scale-down deletion
//!
//! A cycle replaces a live Pod in place: clear the cached Pod, delete,
//! create the desired Pod, then wait for it to report ready. The cached Pod
//! is cleared before the delete is issued so a watcher reacting to the
//! delete event never recreates the Pod from a stale spec.
//!
//! Delete and create failures go to the caller's conflict step; nothing is
//! retried here. The next scheduling pass is the retry. Explicit restart
//! requests for the server are consumed only once the delete succeeds, so an
//! abandoned cycle leaves them pending for that pass.

use crate::api::{DeleteOptions, PodApi, PodServices};
use crate::builder::PodRole;
use crate::presence::{DomainPresenceInfo, ServerKubernetesObjects};
use operator_types::Pod;
use operator_work::{
    await_response, NextAction, Packet, ResponseStep, Result, Step, StepRef,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Cycle {
    services: PodServices,
    info: Arc<DomainPresenceInfo>,
    record: Arc<ServerKubernetesObjects>,
    desired: Arc<Pod>,
    role: PodRole,
    domain_uid: String,
    server_name: String,
    conflict: StepRef,
    next: Option<StepRef>,
}

/// Delete-then-recreate of one server's Pod
pub struct CyclePodStep {
    cycle: Arc<Cycle>,
}

impl CyclePodStep {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        services: PodServices,
        info: Arc<DomainPresenceInfo>,
        desired: Arc<Pod>,
        role: PodRole,
        domain_uid: impl Into<String>,
        server_name: impl Into<String>,
        conflict: StepRef,
        next: Option<StepRef>,
    ) -> Self {
        let server_name = server_name.into();
        Self {
            cycle: Arc::new(Cycle {
                services,
                record: info.server_objects(&server_name),
                info,
                desired,
                role,
                domain_uid: domain_uid.into(),
                server_name,
                conflict,
                next,
            }),
        }
    }
}

impl Step for CyclePodStep {
    fn name(&self) -> &str {
        "cycle-pod"
    }

    fn next(&self) -> Option<StepRef> {
        self.cycle.next.clone()
    }

    fn apply(&self, _packet: &mut Packet) -> Result<NextAction> {
        let cycle = &self.cycle;
        let previous = cycle.record.clear();
        debug!(
            domain_uid = %cycle.domain_uid,
            server = %cycle.server_name,
            had_cached_pod = previous.is_some(),
            "Cycling pod"
        );

        let api = cycle.services.api.clone();
        let name = cycle.desired.name().to_string();
        let namespace = cycle.desired.namespace().to_string();
        Ok(await_response(
            async move {
                api.delete_pod(&name, &namespace, &DeleteOptions::default())
                    .await
            },
            CycleDeleted(cycle.clone()),
        ))
    }
}

struct CycleDeleted(Arc<Cycle>);

impl ResponseStep<()> for CycleDeleted {
    fn name(&self) -> &str {
        "cycle-pod-delete"
    }

    fn next(&self) -> Option<StepRef> {
        self.0.next.clone()
    }

    fn conflict_step(&self) -> Option<StepRef> {
        Some(self.0.conflict.clone())
    }

    fn on_success(&self, _packet: &mut Packet, _result: Option<()>) -> Result<NextAction> {
        let cycle = self.0.clone();
        if cycle.info.take_restarts_for(&cycle.server_name, cycle.role) {
            debug!(
                domain_uid = %cycle.domain_uid,
                server = %cycle.server_name,
                "Restart request satisfied"
            );
        }

        let api = cycle.services.api.clone();
        let desired = cycle.desired.clone();
        Ok(await_response(
            async move { api.create_pod(desired.namespace(), &desired).await },
            CycleCreated(cycle),
        ))
    }
}

struct CycleCreated(Arc<Cycle>);

impl ResponseStep<Pod> for CycleCreated {
    fn name(&self) -> &str {
        "cycle-pod-create"
    }

    fn next(&self) -> Option<StepRef> {
        self.0.next.clone()
    }

    fn conflict_step(&self) -> Option<StepRef> {
        Some(self.0.conflict.clone())
    }

    fn on_success(&self, _packet: &mut Packet, result: Option<Pod>) -> Result<NextAction> {
        let cycle = &self.0;
        info!(
            domain_uid = %cycle.domain_uid,
            server = %cycle.server_name,
            role = %cycle.role,
            "Pod replaced"
        );

        let created = match result {
            Some(pod) => {
                let pod = Arc::new(pod);
                cycle.record.set_pod(Some(pod.clone()));
                pod
            }
            None => cycle.desired.clone(),
        };

        Ok(NextAction::Goto(
            cycle.services.watcher.wait_for_ready(&created, cycle.next.clone()),
        ))
    }
}

/// Default conflict step for a cycle: log and end the chain, leaving the
/// retry to the next scheduling pass.
pub struct AbandonCycleStep {
    domain_uid: String,
    server_name: String,
}

impl AbandonCycleStep {
    pub fn new(domain_uid: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            domain_uid: domain_uid.into(),
            server_name: server_name.into(),
        }
    }
}

impl Step for AbandonCycleStep {
    fn name(&self) -> &str {
        "abandon-cycle"
    }

    fn next(&self) -> Option<StepRef> {
        None
    }

    fn apply(&self, _packet: &mut Packet) -> Result<NextAction> {
        warn!(
            domain_uid = %self.domain_uid,
            server = %self.server_name,
            "Pod cycle abandoned; the next pass will retry"
        );
        Ok(NextAction::Terminate)
    }
}

/// Removes a scaled-down server's Pod
///
/// The cached Pod is taken with get-and-set-to-absent before the delete is
/// issued. The server's presence record is dropped once the delete is done.
pub struct DeletePodStep {
    api: Arc<dyn PodApi>,
    info: Arc<DomainPresenceInfo>,
    server_name: String,
    next: Option<StepRef>,
}

impl DeletePodStep {
    pub fn new(
        api: Arc<dyn PodApi>,
        info: Arc<DomainPresenceInfo>,
        server_name: impl Into<String>,
        next: Option<StepRef>,
    ) -> Self {
        Self {
            api,
            info,
            server_name: server_name.into(),
            next,
        }
    }
}

impl Step for DeletePodStep {
    fn name(&self) -> &str {
        "delete-pod"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, _packet: &mut Packet) -> Result<NextAction> {
        let previous = self
            .info
            .get_server(&self.server_name)
            .and_then(|record| record.clear());

        let Some(pod) = previous else {
            debug!(server = %self.server_name, "No cached pod to delete");
            self.info.remove_server(&self.server_name);
            return Ok(NextAction::Continue);
        };

        let api = self.api.clone();
        let name = pod.name().to_string();
        let namespace = self.info.domain().namespace().to_string();
        Ok(await_response(
            async move {
                api.delete_pod(&name, &namespace, &DeleteOptions::default())
                    .await
            },
            PodDeleted {
                info: self.info.clone(),
                server_name: self.server_name.clone(),
                next: self.next.clone(),
            },
        ))
    }
}

struct PodDeleted {
    info: Arc<DomainPresenceInfo>,
    server_name: String,
    next: Option<StepRef>,
}

impl ResponseStep<()> for PodDeleted {
    fn name(&self) -> &str {
        "delete-pod-response"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn on_success(&self, _packet: &mut Packet, _result: Option<()>) -> Result<NextAction> {
        info!(
            domain_uid = %self.info.domain_uid(),
            server = %self.server_name,
            "Server scaled down"
        );
        self.info.remove_server(&self.server_name);
        Ok(NextAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ApiOp, ImmediateReadyWatcher, InMemoryPodApi};
    use operator_types::{Domain, DomainSpec, ObjectMeta, TuningParameters, WlsDomainConfig};
    use operator_work::{run, ApiError, FiberOutcome};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn pod(name: &str, image: &str) -> Pod {
        let mut pod = Pod {
            metadata: ObjectMeta::named(name, "ns1"),
            ..Default::default()
        };
        let mut container = operator_types::Container::new("weblogic-server");
        container.image = image.into();
        pod.spec.containers.push(container);
        pod
    }

    fn info() -> Arc<DomainPresenceInfo> {
        let domain = Domain::new(
            "ns1",
            DomainSpec::new("uid1", "base_domain", "admin-server", 7001),
        );
        Arc::new(DomainPresenceInfo::new(domain, WlsDomainConfig::new("base_domain")))
    }

    fn services(api: &Arc<InMemoryPodApi>, watcher: &Arc<ImmediateReadyWatcher>) -> PodServices {
        PodServices::new(
            api.clone(),
            watcher.clone(),
            Arc::new(TuningParameters::default()),
        )
    }

    fn cycle_step(
        api: &Arc<InMemoryPodApi>,
        watcher: &Arc<ImmediateReadyWatcher>,
        info: &Arc<DomainPresenceInfo>,
    ) -> StepRef {
        Arc::new(CyclePodStep::new(
            services(api, watcher),
            info.clone(),
            Arc::new(pod("uid1-ms1", "weblogic:v2")),
            PodRole::Managed { listen_port: 8001 },
            "uid1",
            "ms1",
            Arc::new(AbandonCycleStep::new("uid1", "ms1")),
            None,
        ))
    }

    fn cached(info: &Arc<DomainPresenceInfo>, image: &str) -> Arc<ServerKubernetesObjects> {
        let record = info.server_objects("ms1");
        record.set_pod(Some(Arc::new(pod("uid1-ms1", image))));
        record
    }

    #[tokio::test]
    async fn test_cycle_replaces_pod_and_waits_for_ready() {
        let api = Arc::new(InMemoryPodApi::new());
        api.insert_pod(pod("uid1-ms1", "weblogic:v1"));
        let watcher = Arc::new(ImmediateReadyWatcher::new());
        let info = info();
        let record = cached(&info, "weblogic:v1");

        let outcome = run(cycle_step(&api, &watcher, &info), Packet::new())
            .await
            .unwrap();

        assert!(matches!(outcome, FiberOutcome::Completed(_)));
        assert_eq!(
            api.ops(),
            vec![ApiOp::Delete, ApiOp::Create]
        );
        let live = api.pod("uid1-ms1", "ns1").unwrap();
        assert_eq!(live.spec.containers[0].image, "weblogic:v2");
        assert_eq!(record.pod().unwrap().spec.containers[0].image, "weblogic:v2");
        assert_eq!(watcher.waited(), vec!["uid1-ms1".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_pod_cleared_before_delete() {
        let api = Arc::new(InMemoryPodApi::new());
        api.insert_pod(pod("uid1-ms1", "weblogic:v1"));
        let watcher = Arc::new(ImmediateReadyWatcher::new());
        let info = info();
        let record = cached(&info, "weblogic:v1");

        let cleared_at_delete = Arc::new(AtomicBool::new(false));
        {
            let cleared = cleared_at_delete.clone();
            api.on_delete(move |_, _| {
                cleared.store(record.pod().is_none(), Ordering::SeqCst);
            });
        }

        run(cycle_step(&api, &watcher, &info), Packet::new())
            .await
            .unwrap();
        assert!(cleared_at_delete.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_delete_not_found_still_creates() {
        let api = Arc::new(InMemoryPodApi::new());
        let watcher = Arc::new(ImmediateReadyWatcher::new());
        let info = info();

        run(cycle_step(&api, &watcher, &info), Packet::new())
            .await
            .unwrap();
        assert!(api.pod("uid1-ms1", "ns1").is_some());
    }

    #[tokio::test]
    async fn test_create_failure_goes_to_conflict_step() {
        let api = Arc::new(InMemoryPodApi::new());
        api.insert_pod(pod("uid1-ms1", "weblogic:v1"));
        api.fail_next(ApiOp::Create, ApiError::new(500, "internal error"));
        let watcher = Arc::new(ImmediateReadyWatcher::new());
        let info = info();
        let record = cached(&info, "weblogic:v1");

        let outcome = run(cycle_step(&api, &watcher, &info), Packet::new())
            .await
            .unwrap();

        assert!(outcome.is_terminated());
        assert!(api.pod("uid1-ms1", "ns1").is_none());
        assert!(record.pod().is_none());
        assert!(watcher.waited().is_empty());
    }

    #[tokio::test]
    async fn test_restart_request_kept_when_delete_fails() {
        let api = Arc::new(InMemoryPodApi::new());
        api.insert_pod(pod("uid1-ms1", "weblogic:v1"));
        api.fail_next(ApiOp::Delete, ApiError::new(500, "internal error"));
        let watcher = Arc::new(ImmediateReadyWatcher::new());
        let info = info();
        cached(&info, "weblogic:v1");
        info.request_server_restart("ms1");

        let outcome = run(cycle_step(&api, &watcher, &info), Packet::new())
            .await
            .unwrap();

        assert!(outcome.is_terminated());
        assert_eq!(api.ops(), vec![ApiOp::Delete]);
        assert!(info.is_server_restart_requested("ms1"));
    }

    #[tokio::test]
    async fn test_restart_request_consumed_once_deleted() {
        let api = Arc::new(InMemoryPodApi::new());
        api.insert_pod(pod("uid1-ms1", "weblogic:v1"));
        api.fail_next(ApiOp::Create, ApiError::new(500, "internal error"));
        let watcher = Arc::new(ImmediateReadyWatcher::new());
        let info = info();
        info.request_server_restart("ms1");

        run(cycle_step(&api, &watcher, &info), Packet::new())
            .await
            .unwrap();

        // The old Pod is gone, so the next pass creates a fresh one anyway
        assert!(api.pod("uid1-ms1", "ns1").is_none());
        assert!(!info.is_server_restart_requested("ms1"));
    }

    #[tokio::test]
    async fn test_delete_pod_step_removes_record() {
        let api = Arc::new(InMemoryPodApi::new());
        api.insert_pod(pod("uid1-ms2", "weblogic:v1"));
        let info = info();
        info.server_objects("ms2")
            .set_pod(Some(Arc::new(pod("uid1-ms2", "weblogic:v1"))));

        let step: StepRef = Arc::new(DeletePodStep::new(api.clone(), info.clone(), "ms2", None));
        run(step, Packet::new()).await.unwrap();

        assert!(api.pod("uid1-ms2", "ns1").is_none());
        assert!(info.get_server("ms2").is_none());
    }

    #[tokio::test]
    async fn test_delete_pod_step_without_cached_pod() {
        let api = Arc::new(InMemoryPodApi::new());
        let info = info();
        info.server_objects("ms2");

        let step: StepRef = Arc::new(DeletePodStep::new(api.clone(), info.clone(), "ms2", None));
        run(step, Packet::new()).await.unwrap();

        assert!(api.ops().is_empty());
        assert!(info.get_server("ms2").is_none());
    }

    #[tokio::test]
    async fn test_delete_pod_step_tolerates_not_found() {
        let api = Arc::new(InMemoryPodApi::new());
        let info = info();
        info.server_objects("ms2")
            .set_pod(Some(Arc::new(pod("uid1-ms2", "weblogic:v1"))));

        let step: StepRef = Arc::new(DeletePodStep::new(api.clone(), info.clone(), "ms2", None));
        let outcome = run(step, Packet::new()).await.unwrap();

        assert!(matches!(outcome, FiberOutcome::Completed(_)));
        assert_eq!(api.ops(), vec![ApiOp::Delete]);
        assert!(info.get_server("ms2").is_none());
    }
}
