//! Operator Scheduler - which managed servers run
//!
//! Each pass fans cluster restart requests out to their members, computes
//! the target set (non-clustered "always" servers, then per-cluster "always"
//! members and "if needed" members up to the replica target), stops every
//! tracked server outside it, and reconciles the rest through the pod
//! reconciler.
//!
//! ## Key Concepts
//!
//! - **Plan** ([`plan`]): pure and deterministic for a fixed scan
//! - **Steps** ([`steps`]): the chain that applies a plan

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod plan;
pub mod steps;

pub use error::{Result, SchedulerError};
pub use plan::{plan_servers, scale_down_servers, target_servers, ServerPlan};
pub use steps::{ManagedServerUpIteratorStep, ManagedServersUpStep, ServerDownIteratorStep};
