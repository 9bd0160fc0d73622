//! Desired-state builder
//!
//! Pure functions from a server's effective configuration to the Pod the
//! operator wants running for it. The same inputs always produce an equal
//! Pod, which keeps the reconciler's comparison stable from pass to pass.
//!
//! Construction happens in a fixed order: image, port, stop hook, probes,
//! volumes, environment, then metadata.

use operator_types::labels::{
    CLUSTERNAME_LABEL, CREATEDBYOPERATOR_LABEL, DOMAINNAME_LABEL, DOMAINUID_LABEL, DOMAIN_V1,
    EXPORTER_METRICS_PATH, PROMETHEUS_PATH_ANNOTATION, PROMETHEUS_PORT_ANNOTATION,
    PROMETHEUS_SCRAPE_ANNOTATION, RESOURCE_VERSION_LABEL, RESTARTED_LABEL, SERVERNAME_LABEL,
};
use operator_types::legal_names::to_pod_name;
use operator_types::{
    ConfigMapVolumeSource, Container, ContainerPort, Domain, DomainSpec, EnvVar, ExecAction,
    Lifecycle, LifecycleHandler, ObjectMeta, PersistentVolumeClaimVolumeSource, Pod, PodSpec,
    PodTuning, Probe, Result, SecretVolumeSource, ServerConfig, ServerState, TuningParameters,
    TypesError, Volume, VolumeMount,
};

pub const CONTAINER_NAME: &str = "weblogic-server";

pub const START_SERVER_SCRIPT: &str = "/weblogic-operator/scripts/startServer.sh";
pub const STOP_SERVER_SCRIPT: &str = "/weblogic-operator/scripts/stopServer.sh";
pub const LIVENESS_PROBE_SCRIPT: &str = "/weblogic-operator/scripts/livenessProbe.sh";
pub const READINESS_PROBE_SCRIPT: &str = "/weblogic-operator/scripts/readinessProbe.sh";

pub const STORAGE_VOLUME: &str = "weblogic-domain-storage-volume";
pub const STORAGE_MOUNT_PATH: &str = "/shared";
pub const CREDENTIALS_VOLUME: &str = "weblogic-credentials-volume";
pub const CREDENTIALS_MOUNT_PATH: &str = "/weblogic-operator/secrets";
pub const SCRIPTS_VOLUME: &str = "weblogic-domain-cm-volume";
pub const SCRIPTS_MOUNT_PATH: &str = "/weblogic-operator/scripts";
pub const DOMAIN_CONFIG_MAP_NAME: &str = "weblogic-domain-cm";

/// r-xr-xr-x
pub const SCRIPTS_DEFAULT_MODE: u32 = 0o555;

pub const JAVA_OPTIONS_ENV: &str = "JAVA_OPTIONS";
pub const ADMIN_STARTUP_MODE_OPTION: &str = "-Dweblogic.management.startupMode=ADMIN";
pub const INTERNAL_OPERATOR_CERT_ENV: &str = "INTERNAL_OPERATOR_CERT";

/// One probe failure marks the server dead or unready.
const PROBE_FAILURE_THRESHOLD: u32 = 1;

/// Which server a Pod is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodRole {
    Admin,
    Managed { listen_port: u16 },
}

impl std::fmt::Display for PodRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodRole::Admin => write!(f, "admin"),
            PodRole::Managed { .. } => write!(f, "managed"),
        }
    }
}

/// Inputs shared by every Pod of one domain
#[derive(Debug, Clone, Copy)]
pub struct PodContext<'a> {
    pub domain: &'a Domain,
    pub tuning: &'a TuningParameters,
    /// Persistent volume claim names; the first one backs the shared storage
    pub claims: &'a [String],
}

impl<'a> PodContext<'a> {
    pub fn new(domain: &'a Domain, tuning: &'a TuningParameters, claims: &'a [String]) -> Self {
        Self {
            domain,
            tuning,
            claims,
        }
    }

    fn spec(&self) -> &'a DomainSpec {
        &self.domain.spec
    }
}

/// Build the desired Pod for a server.
pub fn build_pod(role: PodRole, server: &ServerConfig, ctx: &PodContext<'_>) -> Result<Pod> {
    let spec = ctx.spec();
    let port = match role {
        PodRole::Admin => spec.as_port,
        PodRole::Managed { listen_port } => listen_port,
    };

    let mut pod = build_base_pod(server, port, ctx)?;

    match role {
        PodRole::Admin => {
            pod.spec.hostname = Some(pod.metadata.name.clone());
            if let Some(container) = pod.spec.containers.first_mut() {
                container.command = admin_start_command(spec);
                container.env.push(EnvVar {
                    name: INTERNAL_OPERATOR_CERT_ENV.to_string(),
                    value: ctx.tuning.internal_operator_cert.clone(),
                    value_from: None,
                });
            }
        }
        PodRole::Managed { .. } => {
            if let Some(container) = pod.spec.containers.first_mut() {
                container.command = managed_start_command(spec, server);
            }
        }
    }

    Ok(pod)
}

pub fn build_admin_pod(server: &ServerConfig, ctx: &PodContext<'_>) -> Result<Pod> {
    build_pod(PodRole::Admin, server, ctx)
}

pub fn build_managed_pod(
    server: &ServerConfig,
    listen_port: u16,
    ctx: &PodContext<'_>,
) -> Result<Pod> {
    build_pod(PodRole::Managed { listen_port }, server, ctx)
}

fn build_base_pod(server: &ServerConfig, port: u16, ctx: &PodContext<'_>) -> Result<Pod> {
    let spec = ctx.spec();
    let mut pod_spec = PodSpec::default();
    let mut container = Container::new(CONTAINER_NAME);

    set_image(&mut pod_spec, &mut container, server);
    container.ports.push(ContainerPort::tcp(port));
    container.lifecycle = Some(stop_server_handler(spec, server));
    container.liveness_probe = Some(liveness_probe(spec, server, &ctx.tuning.pod));
    container.readiness_probe = Some(readiness_probe(spec, server, &ctx.tuning.pod));
    add_volumes(&mut pod_spec, &mut container, spec, ctx.claims);
    add_server_env(&mut container, spec, server)?;

    let metadata = build_metadata(ctx.domain, server, port)?;
    pod_spec.containers.push(container);

    Ok(Pod {
        metadata,
        spec: pod_spec,
    })
}

fn set_image(pod_spec: &mut PodSpec, container: &mut Container, server: &ServerConfig) {
    container.image = server.image.clone();
    container.image_pull_policy = server.image_pull_policy;
    pod_spec.image_pull_secrets = server.image_pull_secrets.clone();
}

fn stop_server_handler(spec: &DomainSpec, server: &ServerConfig) -> Lifecycle {
    Lifecycle {
        pre_stop: Some(LifecycleHandler {
            exec: Some(ExecAction::new([
                STOP_SERVER_SCRIPT,
                spec.domain_uid.as_str(),
                server.server_name.as_str(),
                spec.domain_name.as_str(),
            ])),
        }),
    }
}

fn probe(script: &str, spec: &DomainSpec, server: &ServerConfig) -> Probe {
    Probe {
        exec: Some(ExecAction::new([
            script,
            spec.domain_name.as_str(),
            server.server_name.as_str(),
        ])),
        failure_threshold: Some(PROBE_FAILURE_THRESHOLD),
        ..Default::default()
    }
}

fn liveness_probe(spec: &DomainSpec, server: &ServerConfig, tuning: &PodTuning) -> Probe {
    Probe {
        initial_delay_seconds: Some(tuning.liveness_probe_initial_delay_seconds),
        timeout_seconds: Some(tuning.liveness_probe_timeout_seconds),
        period_seconds: Some(tuning.liveness_probe_period_seconds),
        ..probe(LIVENESS_PROBE_SCRIPT, spec, server)
    }
}

fn readiness_probe(spec: &DomainSpec, server: &ServerConfig, tuning: &PodTuning) -> Probe {
    Probe {
        initial_delay_seconds: Some(tuning.readiness_probe_initial_delay_seconds),
        timeout_seconds: Some(tuning.readiness_probe_timeout_seconds),
        period_seconds: Some(tuning.readiness_probe_period_seconds),
        ..probe(READINESS_PROBE_SCRIPT, spec, server)
    }
}

fn add_volumes(
    pod_spec: &mut PodSpec,
    container: &mut Container,
    spec: &DomainSpec,
    claims: &[String],
) {
    container.volume_mounts.extend([
        VolumeMount {
            name: STORAGE_VOLUME.to_string(),
            mount_path: STORAGE_MOUNT_PATH.to_string(),
            read_only: None,
        },
        VolumeMount {
            name: CREDENTIALS_VOLUME.to_string(),
            mount_path: CREDENTIALS_MOUNT_PATH.to_string(),
            read_only: Some(true),
        },
        VolumeMount {
            name: SCRIPTS_VOLUME.to_string(),
            mount_path: SCRIPTS_MOUNT_PATH.to_string(),
            read_only: Some(true),
        },
    ]);

    if let Some(claim) = claims.first() {
        pod_spec.volumes.push(Volume {
            name: STORAGE_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.clone(),
            }),
            ..Default::default()
        });
    }

    pod_spec.volumes.push(Volume {
        name: CREDENTIALS_VOLUME.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: spec.admin_secret.name.clone(),
        }),
        ..Default::default()
    });

    pod_spec.volumes.push(Volume {
        name: SCRIPTS_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: DOMAIN_CONFIG_MAP_NAME.to_string(),
            default_mode: Some(SCRIPTS_DEFAULT_MODE),
        }),
        ..Default::default()
    });
}

/// The server's configured environment, with the admin startup mode applied
/// when the server starts in admin state.
pub fn server_env(server: &ServerConfig) -> Result<Vec<EnvVar>> {
    match server.started_server_state {
        ServerState::Admin => start_in_admin_mode(&server.env),
        ServerState::Running => Ok(server.env.clone()),
    }
}

/// Prepend the admin startup mode flag to every `JAVA_OPTIONS` entry, or
/// append a new `JAVA_OPTIONS` carrying only the flag.
///
/// An entry that references another value is rejected: rewriting it would
/// change that value for every other consumer.
pub fn start_in_admin_mode(env: &[EnvVar]) -> Result<Vec<EnvVar>> {
    let mut rewritten = Vec::with_capacity(env.len() + 1);
    let mut found = false;

    for var in env {
        if var.name != JAVA_OPTIONS_ENV {
            rewritten.push(var.clone());
            continue;
        }
        if var.is_reference() {
            return Err(TypesError::AliasedEnvVar {
                name: var.name.clone(),
            });
        }
        found = true;
        rewritten.push(EnvVar::new(
            JAVA_OPTIONS_ENV,
            admin_startup_java_options(var.value.as_deref()),
        ));
    }

    if !found {
        rewritten.push(EnvVar::new(JAVA_OPTIONS_ENV, ADMIN_STARTUP_MODE_OPTION));
    }

    Ok(rewritten)
}

fn admin_startup_java_options(previous: Option<&str>) -> String {
    match previous {
        Some(previous) => format!("{} {}", ADMIN_STARTUP_MODE_OPTION, previous),
        None => ADMIN_STARTUP_MODE_OPTION.to_string(),
    }
}

fn add_server_env(container: &mut Container, spec: &DomainSpec, server: &ServerConfig) -> Result<()> {
    container.env.extend(server_env(server)?);

    // Identity overrides for the values baked into the image
    container.env.extend([
        EnvVar::new("DOMAIN_NAME", spec.domain_name.as_str()),
        EnvVar::new("DOMAIN_HOME", format!("/shared/domain/{}", spec.domain_name)),
        EnvVar::new("ADMIN_NAME", spec.as_name.as_str()),
        EnvVar::new("ADMIN_PORT", spec.as_port.to_string()),
        EnvVar::new("SERVER_NAME", server.server_name.as_str()),
        // Null rather than "": the image must not fall back to its default
        // credentials, and "" would not survive a round trip unchanged.
        EnvVar::unset("ADMIN_USERNAME"),
        EnvVar::unset("ADMIN_PASSWORD"),
    ]);

    Ok(())
}

fn build_metadata(domain: &Domain, server: &ServerConfig, port: u16) -> Result<ObjectMeta> {
    let spec = &domain.spec;
    let mut metadata = ObjectMeta::named(
        to_pod_name(&spec.domain_uid, &server.server_name),
        domain.namespace(),
    );

    metadata.annotations.extend([
        (
            PROMETHEUS_PATH_ANNOTATION.to_string(),
            EXPORTER_METRICS_PATH.to_string(),
        ),
        (PROMETHEUS_PORT_ANNOTATION.to_string(), port.to_string()),
        (PROMETHEUS_SCRAPE_ANNOTATION.to_string(), "true".to_string()),
    ]);

    metadata.labels.extend([
        (RESOURCE_VERSION_LABEL.to_string(), DOMAIN_V1.to_string()),
        (DOMAINUID_LABEL.to_string(), spec.domain_uid.clone()),
        (DOMAINNAME_LABEL.to_string(), spec.domain_name.clone()),
        (SERVERNAME_LABEL.to_string(), server.server_name.clone()),
        (CREATEDBYOPERATOR_LABEL.to_string(), "true".to_string()),
    ]);

    if let Some(restarted) = &server.restarted_label {
        metadata
            .labels
            .insert(RESTARTED_LABEL.to_string(), restarted.clone());
    }

    if let Some(cluster_name) = server.cluster_label()? {
        metadata
            .labels
            .insert(CLUSTERNAME_LABEL.to_string(), cluster_name.to_string());
    }

    Ok(metadata)
}

fn admin_start_command(spec: &DomainSpec) -> Vec<String> {
    vec![
        START_SERVER_SCRIPT.to_string(),
        spec.domain_uid.clone(),
        spec.as_name.clone(),
        spec.domain_name.clone(),
    ]
}

fn managed_start_command(spec: &DomainSpec, server: &ServerConfig) -> Vec<String> {
    vec![
        START_SERVER_SCRIPT.to_string(),
        spec.domain_uid.clone(),
        server.server_name.clone(),
        spec.domain_name.clone(),
        spec.as_name.clone(),
        spec.as_port.to_string(),
    ]
}
