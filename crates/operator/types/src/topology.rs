//! Topology scan of a running domain
//!
//! A read-only snapshot of the clusters, their member servers and the
//! standalone servers discovered in the domain's topology descriptor.
//! Member and server lists keep the descriptor's enumeration order, which is
//! the order the scheduler walks them in.

use serde::{Deserialize, Serialize};

/// One server in the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WlsServerConfig {
    pub name: String,
    pub listen_port: u16,
}

impl WlsServerConfig {
    pub fn new(name: impl Into<String>, listen_port: u16) -> Self {
        Self {
            name: name.into(),
            listen_port,
        }
    }
}

/// One cluster and its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WlsClusterConfig {
    pub name: String,

    #[serde(default)]
    pub servers: Vec<WlsServerConfig>,
}

impl WlsClusterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            servers: Vec::new(),
        }
    }

    pub fn with_server(mut self, server: WlsServerConfig) -> Self {
        self.servers.push(server);
        self
    }

    pub fn server_config(&self, name: &str) -> Option<&WlsServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }
}

/// The scanned domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WlsDomainConfig {
    #[serde(default)]
    pub name: String,

    /// Servers that belong to no cluster (normally includes the admin server)
    #[serde(default)]
    pub standalone_servers: Vec<WlsServerConfig>,

    #[serde(default)]
    pub clusters: Vec<WlsClusterConfig>,
}

impl WlsDomainConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_standalone_server(mut self, server: WlsServerConfig) -> Self {
        self.standalone_servers.push(server);
        self
    }

    pub fn with_cluster(mut self, cluster: WlsClusterConfig) -> Self {
        self.clusters.push(cluster);
        self
    }

    /// Standalone server by name. Clustered servers are looked up through
    /// their cluster.
    pub fn server_config(&self, name: &str) -> Option<&WlsServerConfig> {
        self.standalone_servers.iter().find(|s| s.name == name)
    }

    pub fn cluster_config(&self, name: &str) -> Option<&WlsClusterConfig> {
        self.clusters.iter().find(|c| c.name == name)
    }

    /// The cluster a server belongs to, if any.
    pub fn cluster_of(&self, server_name: &str) -> Option<&WlsClusterConfig> {
        self.clusters
            .iter()
            .find(|c| c.server_config(server_name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let scan = WlsDomainConfig::new("base_domain")
            .with_standalone_server(WlsServerConfig::new("admin-server", 7001))
            .with_cluster(
                WlsClusterConfig::new("cluster-1")
                    .with_server(WlsServerConfig::new("ms1", 8001))
                    .with_server(WlsServerConfig::new("ms2", 8001)),
            );

        assert_eq!(scan.server_config("admin-server").unwrap().listen_port, 7001);
        assert!(scan.server_config("ms1").is_none());
        assert_eq!(scan.cluster_of("ms2").unwrap().name, "cluster-1");
        assert!(scan.cluster_config("cluster-2").is_none());
    }
}
