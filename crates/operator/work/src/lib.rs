//! Operator Work - step chain engine
//!
//! Every reconciliation action is a chain of [`Step`]s run by a fiber against
//! a request-scoped [`Packet`]. Steps return a [`NextAction`]: continue along
//! the chain, jump to another step, suspend on an external call, or
//! terminate.
//!
//! ## Key Concepts
//!
//! - **Packet**: string-keyed, type-erased context; cloned shallowly to fork
//! - **Step / NextAction**: a chain node and its verdict
//! - **Fiber**: the driver loop (`run`, `spawn`, `run_all`, `fork_join`)
//! - **ResponseStep**: resumes a chain from an API call, treating 404 as an
//!   absent result and routing other failures to a conflict step
//!
//! Collaborators are passed to step constructors; the packet carries only
//! per-request data.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod fiber;
pub mod packet;
pub mod response;
pub mod step;

pub use error::{ApiError, Result, WorkError, CONFLICT, NOT_FOUND};
pub use fiber::{fork_join, run, run_all, spawn, FiberOutcome, StepAndPacket};
pub use packet::{Packet, PacketValue};
pub use response::{await_response, ApiResult, ResponseStep};
pub use step::{NextAction, Resumption, Step, StepRef, Suspension};
