//! Pod reconciler steps
//!
//! Each step builds the desired Pod for one server, reads the live Pod, and
//! decides:
//!
//! 1. no live Pod: consume any restart request and create;
//! 2. live Pod compatible and no restart requested: adopt it;
//! 3. otherwise: cycle it. The cycle consumes the restart request once its
//!    delete succeeds.
//!
//! A create that conflicts with a Pod made since the read re-enters the
//! step, so the decision is taken again from a fresh read.
//!
//! The admin server cycles inline. Managed servers queue their cycle in the
//! pass's [`RollingBatch`] and end their sub-chain, so replacements across a
//! cluster are drained together with bounded concurrency.

use crate::api::PodServices;
use crate::builder::{build_admin_pod, build_managed_pod, PodContext, PodRole};
use crate::compat::is_compatible;
use crate::cycle::{AbandonCycleStep, CyclePodStep};
use crate::error::PodError;
use crate::keys::{SERVERS_TO_ROLL, SERVER_CONFIG, SERVER_SCAN};
use crate::presence::{DomainPresenceInfo, ServerKubernetesObjects};
use crate::rolling::RollingBatch;
use operator_types::{Pod, ServerConfig, WlsServerConfig};
use operator_work::{
    await_response, ApiError, NextAction, Packet, ResponseStep, Result, Step, StepAndPacket,
    StepRef,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Brings the admin server's Pod in line with the domain spec
pub struct AdminPodStep {
    services: PodServices,
    info: Arc<DomainPresenceInfo>,
    conflict: Option<StepRef>,
    next: Option<StepRef>,
}

impl AdminPodStep {
    pub fn new(
        services: PodServices,
        info: Arc<DomainPresenceInfo>,
        next: Option<StepRef>,
    ) -> Self {
        Self {
            services,
            info,
            conflict: None,
            next,
        }
    }

    /// Step that receives a failed cycle instead of [`AbandonCycleStep`].
    pub fn with_conflict_step(mut self, step: StepRef) -> Self {
        self.conflict = Some(step);
        self
    }
}

impl Step for AdminPodStep {
    fn name(&self) -> &str {
        "admin-pod"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, _packet: &mut Packet) -> Result<NextAction> {
        let domain = self.info.domain();
        let spec = &domain.spec;
        let config = spec.non_clustered_server_config(&spec.as_name);
        let claims = self.info.claims();
        let ctx = PodContext::new(&domain, &self.services.tuning, &claims);

        let desired = build_admin_pod(&config, &ctx)
            .map_err(|e| PodError::desired_state(&config.server_name, e))?;

        Ok(read_pod(ReadPodResponse {
            services: self.services.clone(),
            record: self.info.server_objects(&config.server_name),
            info: self.info.clone(),
            desired: Arc::new(desired),
            role: PodRole::Admin,
            domain_uid: spec.domain_uid.clone(),
            server_name: config.server_name.clone(),
            cluster_name: None,
            conflict: self.conflict.clone(),
            next: self.next.clone(),
        }))
    }
}

/// Brings one managed server's Pod in line with the domain spec
///
/// Reads the server's [`ServerConfig`] and [`WlsServerConfig`] from the
/// packet under [`SERVER_CONFIG`] and [`SERVER_SCAN`].
pub struct ManagedPodStep {
    services: PodServices,
    info: Arc<DomainPresenceInfo>,
    conflict: Option<StepRef>,
    next: Option<StepRef>,
}

impl ManagedPodStep {
    pub fn new(
        services: PodServices,
        info: Arc<DomainPresenceInfo>,
        next: Option<StepRef>,
    ) -> Self {
        Self {
            services,
            info,
            conflict: None,
            next,
        }
    }

    pub fn with_conflict_step(mut self, step: StepRef) -> Self {
        self.conflict = Some(step);
        self
    }
}

impl Step for ManagedPodStep {
    fn name(&self) -> &str {
        "managed-pod"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn apply(&self, packet: &mut Packet) -> Result<NextAction> {
        let config = packet.require::<ServerConfig>(SERVER_CONFIG)?;
        let scan = packet.require::<WlsServerConfig>(SERVER_SCAN)?;

        let domain = self.info.domain();
        let claims = self.info.claims();
        let ctx = PodContext::new(&domain, &self.services.tuning, &claims);

        let desired = build_managed_pod(&config, scan.listen_port, &ctx)
            .map_err(|e| PodError::desired_state(&config.server_name, e))?;

        Ok(read_pod(ReadPodResponse {
            services: self.services.clone(),
            record: self.info.server_objects(&config.server_name),
            info: self.info.clone(),
            desired: Arc::new(desired),
            role: PodRole::Managed {
                listen_port: scan.listen_port,
            },
            domain_uid: domain.spec.domain_uid.clone(),
            server_name: config.server_name.clone(),
            cluster_name: config.cluster_name.clone(),
            conflict: self.conflict.clone(),
            next: self.next.clone(),
        }))
    }
}

fn read_pod(response: ReadPodResponse) -> NextAction {
    let api = response.services.api.clone();
    let name = response.desired.name().to_string();
    let namespace = response.desired.namespace().to_string();
    await_response(
        async move { api.read_pod(&name, &namespace).await },
        response,
    )
}

struct ReadPodResponse {
    services: PodServices,
    info: Arc<DomainPresenceInfo>,
    record: Arc<ServerKubernetesObjects>,
    desired: Arc<Pod>,
    role: PodRole,
    domain_uid: String,
    server_name: String,
    cluster_name: Option<String>,
    conflict: Option<StepRef>,
    next: Option<StepRef>,
}

impl ReadPodResponse {
    fn restart_requested(&self) -> bool {
        match self.role {
            PodRole::Admin => {
                self.info.is_admin_restart_requested()
                    || self.info.is_server_restart_requested(&self.server_name)
            }
            PodRole::Managed { .. } => {
                self.info.is_server_restart_requested(&self.server_name)
                    || self
                        .cluster_name
                        .as_deref()
                        .is_some_and(|c| self.info.is_cluster_restart_requested(c))
            }
        }
    }

    /// The owning step, run again from its read.
    fn reenter(&self) -> StepRef {
        match self.role {
            PodRole::Admin => Arc::new(AdminPodStep {
                services: self.services.clone(),
                info: self.info.clone(),
                conflict: self.conflict.clone(),
                next: self.next.clone(),
            }),
            PodRole::Managed { .. } => Arc::new(ManagedPodStep {
                services: self.services.clone(),
                info: self.info.clone(),
                conflict: self.conflict.clone(),
                next: self.next.clone(),
            }),
        }
    }

    fn create(&self) -> NextAction {
        let api = self.services.api.clone();
        let desired = self.desired.clone();
        await_response(
            async move { api.create_pod(desired.namespace(), &desired).await },
            PodCreated {
                record: self.record.clone(),
                role: self.role,
                domain_uid: self.domain_uid.clone(),
                server_name: self.server_name.clone(),
                reread: self.reenter(),
                next: self.next.clone(),
            },
        )
    }

    fn cycle(&self) -> StepRef {
        let conflict = self.conflict.clone().unwrap_or_else(|| {
            Arc::new(AbandonCycleStep::new(
                self.domain_uid.clone(),
                self.server_name.clone(),
            ))
        });

        Arc::new(CyclePodStep::new(
            self.services.clone(),
            self.info.clone(),
            self.desired.clone(),
            self.role,
            self.domain_uid.clone(),
            self.server_name.clone(),
            conflict,
            self.next.clone(),
        ))
    }
}

impl ResponseStep<Pod> for ReadPodResponse {
    fn name(&self) -> &str {
        "read-pod"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn on_success(&self, packet: &mut Packet, live: Option<Pod>) -> Result<NextAction> {
        let Some(live) = live else {
            let restart = self.info.take_restarts_for(&self.server_name, self.role);
            debug!(
                domain_uid = %self.domain_uid,
                server = %self.server_name,
                role = %self.role,
                explicit_restart = restart,
                "No pod found, creating"
            );
            return Ok(self.create());
        };

        let restart = self.restart_requested();

        if !restart && is_compatible(&self.desired, &live) {
            debug!(
                domain_uid = %self.domain_uid,
                server = %self.server_name,
                role = %self.role,
                "Pod exists with the desired spec"
            );
            self.record.set_pod(Some(Arc::new(live)));
            return Ok(NextAction::Continue);
        }

        debug!(
            domain_uid = %self.domain_uid,
            server = %self.server_name,
            role = %self.role,
            explicit_restart = restart,
            "Pod must be replaced"
        );
        let cycle = self.cycle();

        match self.role {
            PodRole::Admin => Ok(NextAction::Goto(cycle)),
            PodRole::Managed { .. } => match packet.get::<RollingBatch>(SERVERS_TO_ROLL) {
                Some(batch) => {
                    batch.insert(&self.server_name, StepAndPacket::new(cycle, packet.fork()));
                    Ok(NextAction::Terminate)
                }
                None => Ok(NextAction::Goto(cycle)),
            },
        }
    }
}

struct PodCreated {
    record: Arc<ServerKubernetesObjects>,
    role: PodRole,
    domain_uid: String,
    server_name: String,
    reread: StepRef,
    next: Option<StepRef>,
}

impl ResponseStep<Pod> for PodCreated {
    fn name(&self) -> &str {
        "create-pod"
    }

    fn next(&self) -> Option<StepRef> {
        self.next.clone()
    }

    fn on_success(&self, _packet: &mut Packet, created: Option<Pod>) -> Result<NextAction> {
        info!(
            domain_uid = %self.domain_uid,
            server = %self.server_name,
            role = %self.role,
            "Pod created"
        );
        if let Some(pod) = created {
            self.record.set_pod(Some(Arc::new(pod)));
        }
        Ok(NextAction::Continue)
    }

    /// A 409 re-reads; any other failure still fails the chain.
    fn on_failure(&self, packet: &mut Packet, error: ApiError) -> Result<NextAction> {
        if error.is_not_found() {
            return self.on_success(packet, None);
        }
        if !error.is_conflict() {
            return Err(error.into());
        }

        warn!(
            domain_uid = %self.domain_uid,
            server = %self.server_name,
            role = %self.role,
            error = %error,
            "Pod appeared before create, reading it again"
        );
        Ok(NextAction::Goto(self.reread.clone()))
    }
}
