//! Operator Runtime - wiring for a surrounding controller loop
//!
//! Loads [`OperatorConfig`], installs tracing, and exposes
//! [`DomainReconciler`], which runs one reconciliation pass per call:
//! the admin server's Pod first, then the managed servers.
//!
//! ## Example
//!
//! ```ignore
//! let config = OperatorConfig::load(Some("operator.toml"))?;
//! init_tracing(&config.logging);
//!
//! let reconciler = Arc::new(DomainReconciler::new(api, watcher, config));
//! let outcome = reconciler.reconcile(info).await?;
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod error;
pub mod reconciler;
pub mod telemetry;

pub use config::{EngineConfig, LoggingConfig, OperatorConfig};
pub use error::{Result, RuntimeError};
pub use reconciler::{DomainReconciler, PassOutcome};
pub use telemetry::init_tracing;
