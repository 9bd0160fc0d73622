//! Domain reconciliation entry point
//!
//! One pass runs, in a single fiber, the admin pod step followed by the
//! managed-servers-up step. Passes over the same domain share one
//! [`RollingBatch`], so overlapping passes queue at most one cycle per
//! server.

use crate::config::OperatorConfig;
use crate::error::{Result, RuntimeError};
use dashmap::DashMap;
use operator_pods::keys::SERVERS_TO_ROLL;
use operator_pods::{AdminPodStep, DomainPresenceInfo, PodApi, PodServices, PodWatcher, RollingBatch};
use operator_scheduler::ManagedServersUpStep;
use operator_work::{run, FiberOutcome, Packet, StepRef};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub domain_uid: String,
    /// A step ended the pass early, e.g. an abandoned admin cycle
    pub terminated: bool,
    /// Servers with a cached Pod after the pass, sorted
    pub running_servers: Vec<String>,
}

/// Runs reconciliation passes for any number of domains
pub struct DomainReconciler {
    services: PodServices,
    config: Arc<OperatorConfig>,
    batches: DashMap<String, Arc<RollingBatch>>,
}

impl DomainReconciler {
    pub fn new(api: Arc<dyn PodApi>, watcher: Arc<dyn PodWatcher>, config: OperatorConfig) -> Self {
        let services = PodServices::new(api, watcher, Arc::new(config.tuning.clone()));
        Self {
            services,
            config: Arc::new(config),
            batches: DashMap::new(),
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Run one pass for the domain behind `info`.
    #[instrument(skip_all, fields(domain_uid = %info.domain_uid()))]
    pub async fn reconcile(&self, info: Arc<DomainPresenceInfo>) -> Result<PassOutcome> {
        let domain = info.domain();
        let domain_uid = domain.spec.domain_uid.clone();
        domain
            .spec
            .validate()
            .map_err(|source| RuntimeError::InvalidDomain {
                domain_uid: domain_uid.clone(),
                source,
            })?;

        let managed: StepRef = Arc::new(ManagedServersUpStep::new(
            self.services.clone(),
            info.clone(),
            self.config.engine.max_concurrent_cycles,
            None,
        ));
        let admin: StepRef = Arc::new(AdminPodStep::new(
            self.services.clone(),
            info.clone(),
            Some(managed),
        ));

        let mut packet = Packet::new();
        packet.put_shared(SERVERS_TO_ROLL, self.batch(&domain_uid));

        let terminated = match run(admin, packet).await {
            Ok(FiberOutcome::Completed(_)) => false,
            Ok(FiberOutcome::Terminated(_)) => true,
            Err(e) => {
                error!(error = %e, "Reconciliation pass failed");
                return Err(e.into());
            }
        };

        let outcome = PassOutcome {
            domain_uid,
            terminated,
            running_servers: info.running_servers(),
        };
        info!(
            terminated = outcome.terminated,
            running = ?outcome.running_servers,
            "Reconciliation pass finished"
        );
        Ok(outcome)
    }

    /// Run one pass on the tokio runtime.
    pub fn spawn(
        self: &Arc<Self>,
        info: Arc<DomainPresenceInfo>,
    ) -> JoinHandle<Result<PassOutcome>> {
        let reconciler = self.clone();
        tokio::spawn(async move { reconciler.reconcile(info).await })
    }

    /// Drop the shared state kept for a domain that no longer exists.
    pub fn forget(&self, domain_uid: &str) {
        self.batches.remove(domain_uid);
    }

    fn batch(&self, domain_uid: &str) -> Arc<RollingBatch> {
        self.batches
            .entry(domain_uid.to_string())
            .or_insert_with(|| Arc::new(RollingBatch::new()))
            .clone()
    }
}
