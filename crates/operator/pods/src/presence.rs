//! Presence cache: what the operator believes is running for a domain
//!
//! One [`DomainPresenceInfo`] lives for the lifetime of a domain. It holds
//! the current domain snapshot and topology scan, a lazily created
//! [`ServerKubernetesObjects`] record per server, and the one-shot explicit
//! restart requests.
//!
//! The cached Pod of a server record is shared with the watcher, so it is
//! only ever swapped, never mutated in place. Restart requests are consumed
//! with take-and-clear operations so two passes cannot both honor one request.

use crate::builder::PodRole;
use dashmap::{DashMap, DashSet};
use operator_types::{Domain, Pod, ServerConfig, WlsDomainConfig, WlsServerConfig};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Last-known live state of one server
#[derive(Debug, Default)]
pub struct ServerKubernetesObjects {
    pod: Mutex<Option<Arc<Pod>>>,
}

impl ServerKubernetesObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pod(&self) -> Option<Arc<Pod>> {
        self.pod.lock().clone()
    }

    pub fn set_pod(&self, pod: Option<Arc<Pod>>) {
        *self.pod.lock() = pod;
    }

    /// Atomically replace the cached Pod, returning the previous one.
    pub fn get_and_set(&self, pod: Option<Arc<Pod>>) -> Option<Arc<Pod>> {
        std::mem::replace(&mut *self.pod.lock(), pod)
    }

    /// Set the cached Pod to absent.
    pub fn clear(&self) -> Option<Arc<Pod>> {
        self.get_and_set(None)
    }
}

/// A server the scheduler decided should be running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStartupInfo {
    pub server_config: ServerConfig,
    pub scan: WlsServerConfig,
    pub cluster_name: Option<String>,
}

impl ServerStartupInfo {
    pub fn server_name(&self) -> &str {
        &self.server_config.server_name
    }
}

/// Per-domain presence cache
#[derive(Debug)]
pub struct DomainPresenceInfo {
    domain: RwLock<Arc<Domain>>,
    scan: RwLock<Arc<WlsDomainConfig>>,
    claims: RwLock<Vec<String>>,
    servers: DashMap<String, Arc<ServerKubernetesObjects>>,
    explicit_restart_admin: AtomicBool,
    explicit_restart_servers: DashSet<String>,
    explicit_restart_clusters: DashSet<String>,
    server_startup_info: RwLock<Vec<ServerStartupInfo>>,
}

impl DomainPresenceInfo {
    pub fn new(domain: Domain, scan: WlsDomainConfig) -> Self {
        Self {
            domain: RwLock::new(Arc::new(domain)),
            scan: RwLock::new(Arc::new(scan)),
            claims: RwLock::new(Vec::new()),
            servers: DashMap::new(),
            explicit_restart_admin: AtomicBool::new(false),
            explicit_restart_servers: DashSet::new(),
            explicit_restart_clusters: DashSet::new(),
            server_startup_info: RwLock::new(Vec::new()),
        }
    }

    /// Persistent volume claim names available to the domain.
    pub fn with_claims<I, S>(self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_claims(claims);
        self
    }

    pub fn domain(&self) -> Arc<Domain> {
        self.domain.read().clone()
    }

    pub fn set_domain(&self, domain: Domain) {
        *self.domain.write() = Arc::new(domain);
    }

    pub fn scan(&self) -> Arc<WlsDomainConfig> {
        self.scan.read().clone()
    }

    pub fn set_scan(&self, scan: WlsDomainConfig) {
        *self.scan.write() = Arc::new(scan);
    }

    pub fn claims(&self) -> Vec<String> {
        self.claims.read().clone()
    }

    pub fn set_claims<I, S>(&self, claims: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.claims.write() = claims.into_iter().map(Into::into).collect();
    }

    pub fn domain_uid(&self) -> String {
        self.domain.read().spec.domain_uid.clone()
    }

    // Server records

    /// The record for `server_name`, created on first reference.
    pub fn server_objects(&self, server_name: &str) -> Arc<ServerKubernetesObjects> {
        self.servers
            .entry(server_name.to_string())
            .or_insert_with(|| Arc::new(ServerKubernetesObjects::new()))
            .clone()
    }

    pub fn get_server(&self, server_name: &str) -> Option<Arc<ServerKubernetesObjects>> {
        self.servers.get(server_name).map(|entry| entry.value().clone())
    }

    pub fn remove_server(&self, server_name: &str) -> Option<Arc<ServerKubernetesObjects>> {
        self.servers.remove(server_name).map(|(_, record)| record)
    }

    /// Names of every tracked server, sorted.
    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Names of tracked servers with a cached Pod, sorted.
    pub fn running_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .servers
            .iter()
            .filter(|e| e.value().pod().is_some())
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    // Explicit restarts

    pub fn request_admin_restart(&self) {
        self.explicit_restart_admin.store(true, Ordering::SeqCst);
    }

    pub fn request_server_restart(&self, server_name: impl Into<String>) {
        self.explicit_restart_servers.insert(server_name.into());
    }

    pub fn request_cluster_restart(&self, cluster_name: impl Into<String>) {
        self.explicit_restart_clusters.insert(cluster_name.into());
    }

    /// Consume the admin restart request.
    pub fn take_admin_restart(&self) -> bool {
        self.explicit_restart_admin.swap(false, Ordering::SeqCst)
    }

    /// Consume the restart request for one server.
    pub fn take_server_restart(&self, server_name: &str) -> bool {
        self.explicit_restart_servers.remove(server_name).is_some()
    }

    /// Consume the requests a new Pod for `server_name` satisfies: the
    /// server's own request, and the admin request when `role` is admin.
    pub fn take_restarts_for(&self, server_name: &str, role: PodRole) -> bool {
        let admin = matches!(role, PodRole::Admin) && self.take_admin_restart();
        let server = self.take_server_restart(server_name);
        admin || server
    }

    pub fn is_admin_restart_requested(&self) -> bool {
        self.explicit_restart_admin.load(Ordering::SeqCst)
    }

    pub fn is_server_restart_requested(&self, server_name: &str) -> bool {
        self.explicit_restart_servers.contains(server_name)
    }

    pub fn is_cluster_restart_requested(&self, cluster_name: &str) -> bool {
        self.explicit_restart_clusters.contains(cluster_name)
    }

    /// Turn every cluster restart request into restart requests for the
    /// cluster's current members, consuming the cluster requests.
    pub fn fan_out_cluster_restarts(&self, scan: &WlsDomainConfig) {
        let clusters: Vec<String> = self
            .explicit_restart_clusters
            .iter()
            .map(|c| c.key().clone())
            .collect();

        for cluster_name in clusters {
            if self.explicit_restart_clusters.remove(&cluster_name).is_none() {
                continue;
            }
            if let Some(cluster) = scan.cluster_config(&cluster_name) {
                for server in &cluster.servers {
                    debug!(
                        cluster = %cluster_name,
                        server = %server.name,
                        "Cluster restart requested for member"
                    );
                    self.explicit_restart_servers.insert(server.name.clone());
                }
            }
        }
    }

    // Startup plan

    pub fn set_server_startup_info(&self, info: Vec<ServerStartupInfo>) {
        *self.server_startup_info.write() = info;
    }

    pub fn server_startup_info(&self) -> Vec<ServerStartupInfo> {
        self.server_startup_info.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_types::{DomainSpec, ObjectMeta, WlsClusterConfig};

    fn info() -> DomainPresenceInfo {
        let domain = Domain::new(
            "ns1",
            DomainSpec::new("uid1", "base_domain", "admin-server", 7001),
        );
        let scan = WlsDomainConfig::new("base_domain").with_cluster(
            WlsClusterConfig::new("cluster-1")
                .with_server(WlsServerConfig::new("ms1", 8001))
                .with_server(WlsServerConfig::new("ms2", 8001)),
        );
        DomainPresenceInfo::new(domain, scan)
    }

    fn pod(name: &str) -> Arc<Pod> {
        Arc::new(Pod {
            metadata: ObjectMeta::named(name, "ns1"),
            ..Default::default()
        })
    }

    #[test]
    fn test_server_record_is_created_once() {
        let info = info();
        let first = info.server_objects("ms1");
        let second = info.server_objects("ms1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(info.server_names(), vec!["ms1".to_string()]);
    }

    #[test]
    fn test_get_and_set_swaps_pod() {
        let record = ServerKubernetesObjects::new();
        assert!(record.get_and_set(Some(pod("a"))).is_none());

        let previous = record.get_and_set(Some(pod("b"))).unwrap();
        assert_eq!(previous.name(), "a");

        assert_eq!(record.clear().unwrap().name(), "b");
        assert!(record.pod().is_none());
    }

    #[test]
    fn test_running_servers() {
        let info = info();
        info.server_objects("ms2").set_pod(Some(pod("uid1-ms2")));
        info.server_objects("ms1");
        assert_eq!(info.running_servers(), vec!["ms2".to_string()]);
    }

    #[test]
    fn test_restart_requests_are_one_shot() {
        let info = info();
        info.request_admin_restart();
        info.request_server_restart("ms1");

        assert!(info.take_admin_restart());
        assert!(!info.take_admin_restart());
        assert!(info.take_server_restart("ms1"));
        assert!(!info.take_server_restart("ms1"));
    }

    #[test]
    fn test_take_restarts_for_role() {
        let info = info();
        info.request_admin_restart();
        info.request_server_restart("ms1");

        assert!(!info.take_restarts_for("ms2", PodRole::Managed { listen_port: 8001 }));
        assert!(info.is_admin_restart_requested());
        assert!(info.take_restarts_for("ms1", PodRole::Managed { listen_port: 8001 }));
        assert!(info.is_admin_restart_requested());
        assert!(info.take_restarts_for("admin-server", PodRole::Admin));
        assert!(!info.is_admin_restart_requested());
    }

    #[test]
    fn test_cluster_restart_fans_out_to_members() {
        let info = info();
        info.request_cluster_restart("cluster-1");
        info.request_cluster_restart("no-such-cluster");

        let scan = info.scan();
        info.fan_out_cluster_restarts(&scan);

        assert!(info.is_server_restart_requested("ms1"));
        assert!(info.is_server_restart_requested("ms2"));
        assert!(!info.is_cluster_restart_requested("cluster-1"));
        assert!(!info.is_cluster_restart_requested("no-such-cluster"));
    }
}
