//! Operator Pods - server Pod reconciliation
//!
//! Builds the desired Pod of every server from the domain configuration,
//! compares it with the live Pod, and creates, adopts or cycles it.
//!
//! ## Key Concepts
//!
//! - **Desired state** ([`builder`]): a pure, deterministic Pod builder
//! - **Compatibility** ([`compat`]): the live-vs-desired comparison that
//!   decides whether a Pod may stay
//! - **Presence** ([`presence`]): per-domain cache of live Pods and one-shot
//!   restart requests
//! - **Cycle** ([`cycle`]): delete, recreate and wait for readiness
//! - **Rolling batch** ([`rolling`]): managed-server cycles drained together
//!   with bounded concurrency
//!
//! The Pod API and readiness watcher are collaborators behind the traits in
//! [`api`]; in-memory versions live in `testing` behind the `test-utils`
//! feature.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod api;
pub mod builder;
pub mod compat;
pub mod cycle;
pub mod error;
pub mod keys;
pub mod presence;
pub mod reconciler;
pub mod rolling;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use api::{DeleteOptions, PodApi, PodServices, PodWatcher};
pub use builder::{
    build_admin_pod, build_managed_pod, build_pod, server_env, start_in_admin_mode, PodContext,
    PodRole,
};
pub use compat::{compare_unordered, is_compatible};
pub use cycle::{AbandonCycleStep, CyclePodStep, DeletePodStep};
pub use error::{PodError, Result};
pub use presence::{DomainPresenceInfo, ServerKubernetesObjects, ServerStartupInfo};
pub use reconciler::{AdminPodStep, ManagedPodStep};
pub use rolling::{RollServersStep, RollingBatch};
