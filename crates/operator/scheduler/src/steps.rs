//! Scheduling steps
//!
//! [`ManagedServersUpStep`] plans the pass and hands off to
//! [`ServerDownIteratorStep`] (when anything must be stopped) and then to
//! [`ManagedServerUpIteratorStep`], which reconciles every target server in
//! its own forked chain and finally drains the rolling batch.

use crate::plan::plan_servers;
use operator_pods::keys::{SERVERS_TO_ROLL, SERVER_CONFIG, SERVER_SCAN};
use operator_pods::{
    DeletePodStep, DomainPresenceInfo, ManagedPodStep, PodServices, RollServersStep,
    RollingBatch, ServerStartupInfo,
};
use operator_work::{fork_join, NextAction, Packet, Result, Step, StepAndPacket, StepRef};
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point of the managed-server half of a pass
pub struct ManagedServersUpStep {
    services: PodServices,
    info: Arc<DomainPresenceInfo>,
    max_concurrent_cycles: usize,
    next: Option<StepRef>,
}

impl ManagedServersUpStep {
    pub fn new(
        services: PodServices,
        info: Arc<DomainPresenceInfo>,
        max_concurrent_cycles: usize,
        next: Option<StepRef>,
    ) -> Self {
        Self {
            services,
            info,
            max_concurrent_cycles,
            next,
        }
    }
}

impl Step for ManagedServersUpStep {
    fn name(&self) -> &str {
        "managed-servers-up"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, _packet: &mut Packet) -> Result<NextAction> {
        let domain = self.info.domain();
        let spec = &domain.spec;

        debug!(
            domain_uid = %spec.domain_uid,
            running = ?self.info.running_servers(),
            "Running servers"
        );

        let scan = self.info.scan();
        let config = spec.effective_config(&scan);
        self.info.fan_out_cluster_restarts(&scan);

        let plan = plan_servers(&spec.as_name, &config, &scan, &self.info.server_names())?;
        debug!(
            domain_uid = %spec.domain_uid,
            start = ?plan.server_names(),
            stop = ?plan.scale_down,
            "Planned managed servers"
        );
        self.info.set_server_startup_info(plan.startup.clone());

        let up: StepRef = Arc::new(ManagedServerUpIteratorStep::new(
            self.services.clone(),
            self.info.clone(),
            plan.startup,
            self.max_concurrent_cycles,
            self.next.clone(),
        ));

        if plan.scale_down.is_empty() {
            return Ok(NextAction::Goto(up));
        }

        Ok(NextAction::Goto(Arc::new(ServerDownIteratorStep::new(
            self.services.clone(),
            self.info.clone(),
            plan.scale_down,
            Some(up),
        ))))
    }
}

/// Deletes the Pods of servers outside the target set, all at once
pub struct ServerDownIteratorStep {
    services: PodServices,
    info: Arc<DomainPresenceInfo>,
    servers: Vec<String>,
    next: Option<StepRef>,
}

impl ServerDownIteratorStep {
    pub fn new(
        services: PodServices,
        info: Arc<DomainPresenceInfo>,
        servers: Vec<String>,
        next: Option<StepRef>,
    ) -> Self {
        Self {
            services,
            info,
            servers,
            next,
        }
    }
}

impl Step for ServerDownIteratorStep {
    fn name(&self) -> &str {
        "server-down-iterator"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, packet: &mut Packet) -> Result<NextAction> {
        info!(
            domain_uid = %self.info.domain_uid(),
            servers = ?self.servers,
            "Scaling down servers"
        );

        let chains: Vec<StepAndPacket> = self
            .servers
            .iter()
            .map(|server_name| {
                let step: StepRef = Arc::new(DeletePodStep::new(
                    self.services.api.clone(),
                    self.info.clone(),
                    server_name.clone(),
                    None,
                ));
                StepAndPacket::new(step, packet.fork())
            })
            .collect();

        let width = chains.len();
        Ok(fork_join(chains, width, self.next.clone()))
    }
}

/// Reconciles every target server in its own chain, then rolls the servers
/// whose Pods must be replaced
///
/// Uses the packet's [`RollingBatch`] when one is already there, so passes
/// sharing a batch collapse their cycles into one per server.
pub struct ManagedServerUpIteratorStep {
    services: PodServices,
    info: Arc<DomainPresenceInfo>,
    startup: Vec<ServerStartupInfo>,
    max_concurrent_cycles: usize,
    next: Option<StepRef>,
}

impl ManagedServerUpIteratorStep {
    pub fn new(
        services: PodServices,
        info: Arc<DomainPresenceInfo>,
        startup: Vec<ServerStartupInfo>,
        max_concurrent_cycles: usize,
        next: Option<StepRef>,
    ) -> Self {
        Self {
            services,
            info,
            startup,
            max_concurrent_cycles,
            next,
        }
    }
}

impl Step for ManagedServerUpIteratorStep {
    fn name(&self) -> &str {
        "managed-server-up-iterator"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, packet: &mut Packet) -> Result<NextAction> {
        if !packet.contains_key(SERVERS_TO_ROLL) {
            packet.put(SERVERS_TO_ROLL, RollingBatch::new());
        }

        let chains: Vec<StepAndPacket> = self
            .startup
            .iter()
            .map(|server| {
                let mut forked = packet.fork();
                forked.put(SERVER_CONFIG, server.server_config.clone());
                forked.put(SERVER_SCAN, server.scan.clone());

                let step: StepRef = Arc::new(ManagedPodStep::new(
                    self.services.clone(),
                    self.info.clone(),
                    None,
                ));
                StepAndPacket::new(step, forked)
            })
            .collect();

        let roll: StepRef = Arc::new(RollServersStep::new(
            self.max_concurrent_cycles,
            self.next.clone(),
        ));

        let width = chains.len();
        Ok(fork_join(chains, width, Some(roll)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_pods::testing::{ApiOp, ImmediateReadyWatcher, InMemoryPodApi};
    use operator_types::{
        ClusterOverrides, Domain, DomainSpec, ObjectMeta, Pod, TuningParameters,
        WlsClusterConfig, WlsDomainConfig, WlsServerConfig,
    };
    use operator_work::run;

    fn info(replicas: u32) -> Arc<DomainPresenceInfo> {
        let mut spec = DomainSpec::new("uid1", "base_domain", "admin-server", 7001);
        spec.clusters.insert(
            "cluster-1".into(),
            ClusterOverrides {
                replicas: Some(replicas),
                ..Default::default()
            },
        );
        let scan = WlsDomainConfig::new("base_domain")
            .with_standalone_server(WlsServerConfig::new("admin-server", 7001))
            .with_cluster(
                WlsClusterConfig::new("cluster-1")
                    .with_server(WlsServerConfig::new("ms1", 8001))
                    .with_server(WlsServerConfig::new("ms2", 8001))
                    .with_server(WlsServerConfig::new("ms3", 8001)),
            );
        Arc::new(DomainPresenceInfo::new(Domain::new("ns1", spec), scan))
    }

    fn step(api: &Arc<InMemoryPodApi>, info: &Arc<DomainPresenceInfo>) -> StepRef {
        let services = PodServices::new(
            api.clone(),
            Arc::new(ImmediateReadyWatcher::new()),
            Arc::new(TuningParameters::default()),
        );
        Arc::new(ManagedServersUpStep::new(services, info.clone(), 1, None))
    }

    #[tokio::test]
    async fn test_starts_replicas_and_records_startup_info() {
        let api = Arc::new(InMemoryPodApi::new());
        let info = info(2);

        run(step(&api, &info), Packet::new()).await.unwrap();

        assert_eq!(api.pod_names(), vec!["uid1-ms1", "uid1-ms2"]);
        let planned: Vec<String> = info
            .server_startup_info()
            .iter()
            .map(|s| s.server_name().to_string())
            .collect();
        assert_eq!(planned, vec!["ms1", "ms2"]);
    }

    #[tokio::test]
    async fn test_scale_down_deletes_untracked_pods() {
        let api = Arc::new(InMemoryPodApi::new());
        let info = info(1);
        let stale = Pod {
            metadata: ObjectMeta::named("uid1-ms3", "ns1"),
            ..Default::default()
        };
        api.insert_pod(stale.clone());
        info.server_objects("ms3").set_pod(Some(Arc::new(stale)));

        run(step(&api, &info), Packet::new()).await.unwrap();

        assert_eq!(api.pod_names(), vec!["uid1-ms1"]);
        assert!(info.get_server("ms3").is_none());
        assert_eq!(api.count(ApiOp::Delete), 1);
    }

    #[tokio::test]
    async fn test_cluster_restart_fans_out_and_cycles_members() {
        let api = Arc::new(InMemoryPodApi::new());
        let info = info(2);
        run(step(&api, &info), Packet::new()).await.unwrap();
        api.clear_calls();

        info.request_cluster_restart("cluster-1");
        run(step(&api, &info), Packet::new()).await.unwrap();

        assert_eq!(api.count(ApiOp::Delete), 2);
        assert_eq!(api.count(ApiOp::Create), 2);
        assert!(!info.is_cluster_restart_requested("cluster-1"));
        assert!(!info.is_server_restart_requested("ms1"));
        assert!(!info.is_server_restart_requested("ms2"));
        // ms3 is not running, so its fanned-out request stays pending
        assert!(info.is_server_restart_requested("ms3"));
    }

    #[tokio::test]
    async fn test_existing_batch_is_reused() {
        let api = Arc::new(InMemoryPodApi::new());
        let info = info(1);
        let batch = Arc::new(RollingBatch::new());
        let mut packet = Packet::new();
        packet.put_shared(SERVERS_TO_ROLL, batch.clone());

        let outcome = run(step(&api, &info), packet).await.unwrap();

        let shared = outcome.packet().get::<RollingBatch>(SERVERS_TO_ROLL).unwrap();
        assert!(Arc::ptr_eq(&shared, &batch));
    }
}
