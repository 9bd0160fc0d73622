//! Operator Types - Core types for the domain operator
//!
//! The domain operator keeps the Pods of a multi-server application domain
//! (one admin server plus standalone and clustered managed servers) in sync
//! with a declarative domain specification.
//!
//! ## Key Concepts
//!
//! - **Domain**: declarative specification of one application domain
//! - **DomainConfig**: effective per-server / per-cluster configuration,
//!   resolved from the domain spec against the topology scan
//! - **WlsDomainConfig**: read-only topology scan (clusters, members, ports)
//! - **Pod**: the platform object model the operator builds and compares
//! - **PodTuning**: probe timing supplied by the tuning parameters provider

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod domain;
pub mod error;
pub mod labels;
pub mod legal_names;
pub mod pod;
pub mod topology;
pub mod tuning;

pub use domain::{
    ClusterConfig, ClusterOverrides, Domain, DomainConfig, DomainSpec, SecretReference,
    ServerConfig, ServerKind, ServerOverrides, ServerState, StartPolicy,
};
pub use error::{Result, TypesError};
pub use pod::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvFromSource, EnvVar, EnvVarSource,
    ExecAction, ImagePullPolicy, KeySelector, Lifecycle, LifecycleHandler, LocalObjectReference,
    ObjectMeta, PersistentVolumeClaimVolumeSource, Pod, PodSpec, Probe, SecretVolumeSource, Volume,
    VolumeMount,
};
pub use topology::{WlsClusterConfig, WlsDomainConfig, WlsServerConfig};
pub use tuning::{PodTuning, TuningParameters};
