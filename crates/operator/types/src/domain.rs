//! Domain specification and effective server configuration
//!
//! A [`Domain`] is the declarative description of one application domain.
//! Settings are layered: domain-wide defaults, then per-cluster settings,
//! then per-server overrides. [`DomainSpec::effective_config`] resolves the
//! layers against a topology scan into one [`ServerConfig`] per server the
//! operator may run.

use crate::error::{Result, TypesError};
use crate::pod::{EnvVar, ImagePullPolicy, LocalObjectReference, ObjectMeta};
use crate::topology::{WlsClusterConfig, WlsDomainConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a server should be running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartPolicy {
    /// Always run the server
    Always,
    /// Run the server only while its cluster is below its replica target
    IfNeeded,
    /// Never run the server
    Never,
}

/// The state a server is brought up in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerState {
    #[default]
    Running,
    /// Started with the admin startup mode flag
    Admin,
}

/// Reference to the secret holding the admin credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SecretReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }
}

/// Per-server settings that replace the inherited defaults when present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOverrides {
    #[serde(default)]
    pub start_policy: Option<StartPolicy>,

    #[serde(default)]
    pub started_server_state: Option<ServerState>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub image_pull_policy: Option<ImagePullPolicy>,

    #[serde(default)]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,

    /// Replaces the inherited environment as a whole
    #[serde(default)]
    pub env: Option<Vec<EnvVar>>,

    #[serde(default)]
    pub restarted_label: Option<String>,
}

/// Per-cluster settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOverrides {
    #[serde(default)]
    pub replicas: Option<u32>,

    /// Start policy applied to members without their own
    #[serde(default)]
    pub clustered_server_start_policy: Option<StartPolicy>,

    /// Settings applied to every member
    #[serde(default)]
    pub defaults: ServerOverrides,

    /// Settings for individual members
    #[serde(default)]
    pub servers: BTreeMap<String, ServerOverrides>,
}

/// Declarative specification of one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    #[serde(rename = "domainUID")]
    pub domain_uid: String,

    pub domain_name: String,

    /// Admin server name
    pub as_name: String,

    /// Admin server listen port
    pub as_port: u16,

    #[serde(default)]
    pub admin_secret: SecretReference,

    #[serde(default = "default_image")]
    pub image: String,

    /// When absent, derived from the image tag
    #[serde(default)]
    pub image_pull_policy: Option<ImagePullPolicy>,

    #[serde(default)]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    #[serde(default)]
    pub env: Vec<EnvVar>,

    #[serde(default)]
    pub started_server_state: ServerState,

    #[serde(default)]
    pub restarted_label: Option<String>,

    /// Replica target for clusters without their own
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Overrides for non-clustered servers, including the admin server
    #[serde(default)]
    pub servers: BTreeMap<String, ServerOverrides>,

    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterOverrides>,
}

impl DomainSpec {
    pub fn new(
        domain_uid: impl Into<String>,
        domain_name: impl Into<String>,
        as_name: impl Into<String>,
        as_port: u16,
    ) -> Self {
        Self {
            domain_uid: domain_uid.into(),
            domain_name: domain_name.into(),
            as_name: as_name.into(),
            as_port,
            admin_secret: SecretReference::default(),
            image: default_image(),
            image_pull_policy: None,
            image_pull_secrets: Vec::new(),
            env: Vec::new(),
            started_server_state: ServerState::Running,
            restarted_label: None,
            replicas: default_replicas(),
            servers: BTreeMap::new(),
            clusters: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain_uid.is_empty() {
            return Err(TypesError::EmptyDomainUid);
        }

        if self.as_name.is_empty() {
            return Err(TypesError::EmptyAdminServerName);
        }

        if self.domain_name.is_empty() {
            return Err(TypesError::InvalidSpec("domain name cannot be empty".into()));
        }

        if self.as_port == 0 {
            return Err(TypesError::InvalidSpec("admin server port must be > 0".into()));
        }

        Ok(())
    }

    fn base_config(&self, server_name: &str, kind: ServerKind) -> ServerConfig {
        ServerConfig {
            server_name: server_name.to_string(),
            kind,
            cluster_name: None,
            start_policy: match kind {
                ServerKind::NonClustered => StartPolicy::Always,
                ServerKind::Clustered => StartPolicy::IfNeeded,
            },
            started_server_state: self.started_server_state,
            image: self.image.clone(),
            image_pull_policy: self
                .image_pull_policy
                .unwrap_or_else(|| ImagePullPolicy::default_for_image(&self.image)),
            image_pull_secrets: self.image_pull_secrets.clone(),
            env: self.env.clone(),
            restarted_label: self.restarted_label.clone(),
        }
    }

    /// Effective configuration of a non-clustered server (the admin server
    /// included), whether or not it appears in a scan.
    pub fn non_clustered_server_config(&self, server_name: &str) -> ServerConfig {
        let mut config = self.base_config(server_name, ServerKind::NonClustered);
        if let Some(overrides) = self.servers.get(server_name) {
            config.apply(overrides);
        }
        config
    }

    fn cluster_config(&self, cluster: &WlsClusterConfig) -> ClusterConfig {
        let overrides = self.clusters.get(&cluster.name);
        let replicas = overrides
            .and_then(|o| o.replicas)
            .unwrap_or(self.replicas);

        let servers = cluster
            .servers
            .iter()
            .map(|member| {
                let mut config = self.base_config(&member.name, ServerKind::Clustered);
                config.cluster_name = Some(cluster.name.clone());
                if let Some(overrides) = overrides {
                    if let Some(policy) = overrides.clustered_server_start_policy {
                        config.start_policy = policy;
                    }
                    config.apply(&overrides.defaults);
                    if let Some(member_overrides) = overrides.servers.get(&member.name) {
                        config.apply(member_overrides);
                    }
                }
                config
            })
            .collect();

        ClusterConfig {
            cluster_name: cluster.name.clone(),
            replicas,
            servers,
        }
    }

    /// Resolve every layer of the domain spec against `scan`.
    ///
    /// Non-clustered servers follow the scan's standalone order; the admin
    /// server is placed first when the scan does not list it. Clusters and
    /// their members follow the scan's enumeration order.
    pub fn effective_config(&self, scan: &WlsDomainConfig) -> DomainConfig {
        let mut servers = Vec::with_capacity(scan.standalone_servers.len() + 1);
        if scan.server_config(&self.as_name).is_none() {
            servers.push(self.non_clustered_server_config(&self.as_name));
        }
        servers.extend(
            scan.standalone_servers
                .iter()
                .map(|s| self.non_clustered_server_config(&s.name)),
        );

        let clusters = scan
            .clusters
            .iter()
            .map(|c| self.cluster_config(c))
            .collect();

        DomainConfig { servers, clusters }
    }
}

/// A domain resource: metadata plus specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default)]
    pub metadata: ObjectMeta,

    pub spec: DomainSpec,
}

impl Domain {
    pub fn new(namespace: impl Into<String>, spec: DomainSpec) -> Self {
        Self {
            metadata: ObjectMeta::named(spec.domain_uid.clone(), namespace),
            spec,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn domain_uid(&self) -> &str {
        &self.spec.domain_uid
    }
}

/// Role of a server within the domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerKind {
    NonClustered,
    Clustered,
}

/// Effective configuration of one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_name: String,
    pub kind: ServerKind,
    /// Set for every clustered server resolved from a scan
    pub cluster_name: Option<String>,
    pub start_policy: StartPolicy,
    pub started_server_state: ServerState,
    pub image: String,
    pub image_pull_policy: ImagePullPolicy,
    pub image_pull_secrets: Vec<LocalObjectReference>,
    pub env: Vec<EnvVar>,
    pub restarted_label: Option<String>,
}

impl ServerConfig {
    fn apply(&mut self, overrides: &ServerOverrides) {
        if let Some(policy) = overrides.start_policy {
            self.start_policy = policy;
        }
        if let Some(state) = overrides.started_server_state {
            self.started_server_state = state;
        }
        if let Some(image) = &overrides.image {
            self.image = image.clone();
            if overrides.image_pull_policy.is_none() {
                self.image_pull_policy = ImagePullPolicy::default_for_image(image);
            }
        }
        if let Some(policy) = overrides.image_pull_policy {
            self.image_pull_policy = policy;
        }
        if let Some(secrets) = &overrides.image_pull_secrets {
            self.image_pull_secrets = secrets.clone();
        }
        if let Some(env) = &overrides.env {
            self.env = env.clone();
        }
        if let Some(label) = &overrides.restarted_label {
            self.restarted_label = Some(label.clone());
        }
    }

    pub fn is_clustered(&self) -> bool {
        self.kind == ServerKind::Clustered
    }

    /// The cluster name to label this server's pod with.
    ///
    /// Non-clustered servers have none. A clustered server without a cluster
    /// name is rejected.
    pub fn cluster_label(&self) -> Result<Option<&str>> {
        match (self.kind, self.cluster_name.as_deref()) {
            (ServerKind::NonClustered, _) => Ok(None),
            (ServerKind::Clustered, Some(name)) => Ok(Some(name)),
            (ServerKind::Clustered, None) => Err(TypesError::MissingClusterName {
                server_name: self.server_name.clone(),
            }),
        }
    }
}

/// Effective configuration of one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub cluster_name: String,
    pub replicas: u32,
    /// Members in scan order
    pub servers: Vec<ServerConfig>,
}

impl ClusterConfig {
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.server_name == name)
    }
}

/// Effective configuration of a whole domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Non-clustered servers, the admin server included
    pub servers: Vec<ServerConfig>,
    pub clusters: Vec<ClusterConfig>,
}

impl DomainConfig {
    /// Non-clustered server by name.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.server_name == name)
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterConfig> {
        self.clusters.iter().find(|c| c.cluster_name == name)
    }
}

// Default value helpers
fn default_image() -> String {
    "store/oracle/weblogic:12.2.1.3".to_string()
}

fn default_replicas() -> u32 {
    1
}
