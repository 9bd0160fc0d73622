//! Scheduling plan for one pass
//!
//! Pure functions of the effective configuration, the topology scan and the
//! set of tracked servers. For fixed inputs the plan is identical on every
//! pass, so repeated passes converge instead of oscillating.

use crate::error::{Result, SchedulerError};
use operator_pods::{server_env, ServerStartupInfo};
use operator_types::{
    ClusterConfig, DomainConfig, ServerConfig, StartPolicy, WlsClusterConfig, WlsDomainConfig,
    WlsServerConfig,
};

/// What one pass starts and stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPlan {
    /// Servers to run, in scheduling order
    pub startup: Vec<ServerStartupInfo>,
    /// Tracked servers to delete, sorted
    pub scale_down: Vec<String>,
}

impl ServerPlan {
    pub fn server_names(&self) -> Vec<&str> {
        self.startup.iter().map(|s| s.server_name()).collect()
    }
}

/// Plan a pass: the target set, then everything tracked outside it.
pub fn plan_servers(
    admin_name: &str,
    config: &DomainConfig,
    scan: &WlsDomainConfig,
    tracked: &[String],
) -> Result<ServerPlan> {
    let startup = target_servers(admin_name, config, scan)?;
    let scale_down = scale_down_servers(admin_name, config, tracked, &startup);
    Ok(ServerPlan {
        startup,
        scale_down,
    })
}

/// Managed servers that should be running.
///
/// Non-clustered servers come first, in configuration order, then each
/// cluster's members. The admin server is never part of the target set.
pub fn target_servers(
    admin_name: &str,
    config: &DomainConfig,
    scan: &WlsDomainConfig,
) -> Result<Vec<ServerStartupInfo>> {
    let mut targets = Targets::new(admin_name);

    for server in &config.servers {
        if server.start_policy != StartPolicy::Always {
            continue;
        }
        if let Some(entry) = scan.server_config(&server.server_name) {
            targets.add(server, entry, None)?;
        }
    }

    for cluster in &config.clusters {
        if let Some(wls_cluster) = scan.cluster_config(&cluster.cluster_name) {
            add_cluster(&mut targets, cluster, wls_cluster)?;
        }
    }

    Ok(targets.startup)
}

/// "Always" members unconditionally, then "if needed" members in scan order
/// while the cluster is below its replica target.
fn add_cluster(
    targets: &mut Targets<'_>,
    cluster: &ClusterConfig,
    wls_cluster: &WlsClusterConfig,
) -> Result<()> {
    let mut started = 0u32;
    let mut if_needed = Vec::new();

    for member in &cluster.servers {
        match member.start_policy {
            StartPolicy::Always => {
                if let Some(entry) = wls_cluster.server_config(&member.server_name) {
                    if targets.add(member, entry, Some(&cluster.cluster_name))? {
                        started += 1;
                    }
                }
            }
            StartPolicy::IfNeeded => if_needed.push(member),
            StartPolicy::Never => {}
        }
    }

    for member in if_needed {
        if started >= cluster.replicas {
            break;
        }
        if let Some(entry) = wls_cluster.server_config(&member.server_name) {
            if targets.add(member, entry, Some(&cluster.cluster_name))? {
                started += 1;
            }
        }
    }

    Ok(())
}

struct Targets<'a> {
    admin_name: &'a str,
    startup: Vec<ServerStartupInfo>,
}

impl<'a> Targets<'a> {
    fn new(admin_name: &'a str) -> Self {
        Self {
            admin_name,
            startup: Vec::new(),
        }
    }

    fn contains(&self, server_name: &str) -> bool {
        self.startup.iter().any(|s| s.server_name() == server_name)
    }

    /// Returns whether the server was added.
    fn add(
        &mut self,
        server: &ServerConfig,
        scan: &WlsServerConfig,
        cluster_name: Option<&str>,
    ) -> Result<bool> {
        if server.server_name == self.admin_name || self.contains(&server.server_name) {
            return Ok(false);
        }

        // Fails the plan before any Pod is touched
        server_env(server).map_err(|source| SchedulerError::StartupEnv {
            server_name: server.server_name.clone(),
            source,
        })?;

        self.startup.push(ServerStartupInfo {
            server_config: server.clone(),
            scan: scan.clone(),
            cluster_name: cluster_name.map(str::to_string),
        });
        Ok(true)
    }
}

/// Tracked servers outside the target set, sorted.
///
/// The admin server is kept unless its own start policy is "never".
pub fn scale_down_servers(
    admin_name: &str,
    config: &DomainConfig,
    tracked: &[String],
    startup: &[ServerStartupInfo],
) -> Vec<String> {
    let stop_admin = config
        .server(admin_name)
        .is_some_and(|admin| admin.start_policy == StartPolicy::Never);

    let mut stopping: Vec<String> = tracked
        .iter()
        .filter(|name| stop_admin || name.as_str() != admin_name)
        .filter(|name| !startup.iter().any(|s| s.server_name() == name.as_str()))
        .cloned()
        .collect();
    stopping.sort();
    stopping.dedup();
    stopping
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_pods::builder::{ADMIN_STARTUP_MODE_OPTION, JAVA_OPTIONS_ENV};
    use operator_types::{
        ClusterOverrides, DomainSpec, EnvVar, EnvVarSource, KeySelector, ServerOverrides,
        ServerState, TypesError, WlsClusterConfig,
    };

    fn scan() -> WlsDomainConfig {
        WlsDomainConfig::new("base_domain")
            .with_standalone_server(WlsServerConfig::new("admin-server", 7001))
            .with_standalone_server(WlsServerConfig::new("standalone", 7101))
            .with_cluster(
                WlsClusterConfig::new("cluster-1")
                    .with_server(WlsServerConfig::new("S1", 8001))
                    .with_server(WlsServerConfig::new("S2", 8001))
                    .with_server(WlsServerConfig::new("S3", 8001)),
            )
    }

    fn spec() -> DomainSpec {
        DomainSpec::new("uid1", "base_domain", "admin-server", 7001)
    }

    fn with_replicas(mut spec: DomainSpec, replicas: u32) -> DomainSpec {
        spec.clusters
            .entry("cluster-1".into())
            .or_insert_with(ClusterOverrides::default)
            .replicas = Some(replicas);
        spec
    }

    fn names(startup: &[ServerStartupInfo]) -> Vec<&str> {
        startup.iter().map(|s| s.server_name()).collect()
    }

    #[test]
    fn test_replicas_limit_if_needed_members() {
        let spec = with_replicas(spec(), 2);
        let config = spec.effective_config(&scan());
        let startup = target_servers("admin-server", &config, &scan()).unwrap();
        assert_eq!(names(&startup), vec!["standalone", "S1", "S2"]);
    }

    #[test]
    fn test_always_members_count_toward_replicas() {
        let mut spec = with_replicas(spec(), 2);
        spec.clusters.get_mut("cluster-1").unwrap().servers.insert(
            "S3".into(),
            ServerOverrides {
                start_policy: Some(StartPolicy::Always),
                ..Default::default()
            },
        );

        let config = spec.effective_config(&scan());
        let startup = target_servers("admin-server", &config, &scan()).unwrap();
        assert_eq!(names(&startup), vec!["standalone", "S3", "S1"]);
    }

    #[test]
    fn test_never_members_are_skipped() {
        let mut spec = with_replicas(spec(), 3);
        spec.clusters.get_mut("cluster-1").unwrap().servers.insert(
            "S1".into(),
            ServerOverrides {
                start_policy: Some(StartPolicy::Never),
                ..Default::default()
            },
        );

        let config = spec.effective_config(&scan());
        let startup = target_servers("admin-server", &config, &scan()).unwrap();
        assert_eq!(names(&startup), vec!["standalone", "S2", "S3"]);
    }

    #[test]
    fn test_cluster_members_carry_cluster_name() {
        let config = spec().effective_config(&scan());
        let startup = target_servers("admin-server", &config, &scan()).unwrap();
        let s1 = startup.iter().find(|s| s.server_name() == "S1").unwrap();
        assert_eq!(s1.cluster_name.as_deref(), Some("cluster-1"));
        assert_eq!(s1.scan.listen_port, 8001);

        let standalone = startup.iter().find(|s| s.server_name() == "standalone").unwrap();
        assert!(standalone.cluster_name.is_none());
    }

    #[test]
    fn test_non_clustered_server_needs_scan_entry() {
        let mut spec = spec();
        spec.servers.insert("ghost".into(), ServerOverrides::default());
        let config = spec.effective_config(&scan());
        let startup = target_servers("admin-server", &config, &scan()).unwrap();
        assert!(!names(&startup).contains(&"ghost"));
        assert!(!names(&startup).contains(&"admin-server"));
    }

    #[test]
    fn test_scale_down_excludes_admin() {
        let config = spec().effective_config(&scan());
        let tracked: Vec<String> = vec!["A".into(), "B".into(), "admin-server".into()];
        let mut server_config = config.server("standalone").unwrap().clone();
        server_config.server_name = "A".into();
        let startup = vec![ServerStartupInfo {
            server_config,
            scan: WlsServerConfig::new("A", 7101),
            cluster_name: None,
        }];

        let stopping = scale_down_servers("admin-server", &config, &tracked, &startup);
        assert_eq!(stopping, vec!["B".to_string()]);
    }

    #[test]
    fn test_scale_down_includes_admin_with_never_policy() {
        let mut spec = spec();
        spec.servers.insert(
            "admin-server".into(),
            ServerOverrides {
                start_policy: Some(StartPolicy::Never),
                ..Default::default()
            },
        );
        let config = spec.effective_config(&scan());
        let tracked: Vec<String> = vec!["admin-server".into()];

        let stopping = scale_down_servers("admin-server", &config, &tracked, &[]);
        assert_eq!(stopping, vec!["admin-server".to_string()]);
    }

    #[test]
    fn test_admin_mode_env_accepted_by_plan() {
        let mut spec = spec();
        spec.env = vec![EnvVar::new("A", "1")];
        spec.started_server_state = ServerState::Admin;

        let config = spec.effective_config(&scan());
        let startup = target_servers("admin-server", &config, &scan()).unwrap();
        assert_eq!(startup[0].server_name(), "standalone");
        assert_eq!(
            server_env(&startup[0].server_config).unwrap(),
            vec![
                EnvVar::new("A", "1"),
                EnvVar::new(JAVA_OPTIONS_ENV, ADMIN_STARTUP_MODE_OPTION),
            ]
        );
    }

    #[test]
    fn test_aliased_java_options_fails_plan() {
        let mut spec = spec();
        spec.started_server_state = ServerState::Admin;
        spec.env = vec![EnvVar::from_source(
            JAVA_OPTIONS_ENV,
            EnvVarSource {
                config_map_key_ref: Some(KeySelector {
                    name: "jvm".into(),
                    key: "options".into(),
                }),
                secret_key_ref: None,
            },
        )];

        let config = spec.effective_config(&scan());
        let err = target_servers("admin-server", &config, &scan()).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::StartupEnv {
                server_name: "standalone".into(),
                source: TypesError::AliasedEnvVar {
                    name: JAVA_OPTIONS_ENV.into()
                },
            }
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let spec = with_replicas(spec(), 2);
        let config = spec.effective_config(&scan());
        let tracked: Vec<String> = vec!["S3".into(), "S1".into()];

        let first = plan_servers("admin-server", &config, &scan(), &tracked).unwrap();
        let second = plan_servers("admin-server", &config, &scan(), &tracked).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.scale_down, vec!["S3".to_string()]);
        assert_eq!(first.server_names(), vec!["standalone", "S1", "S2"]);
    }
}
