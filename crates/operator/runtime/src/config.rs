//! Configuration for the domain operator

use crate::error::Result;
use operator_types::TuningParameters;
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `OPERATOR__ENGINE__MAX_CONCURRENT_CYCLES`
pub const ENV_PREFIX: &str = "OPERATOR";

/// Main operator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Probe timing and the internal operator certificate
    #[serde(default)]
    pub tuning: TuningParameters,

    /// Step engine limits
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Step engine limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pod cycles of one rolling batch allowed in flight at once
    #[serde(default = "default_max_concurrent_cycles")]
    pub max_concurrent_cycles: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_cycles: default_max_concurrent_cycles(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_max_concurrent_cycles() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl OperatorConfig {
    /// Load configuration: built-in defaults, then the optional file, then
    /// `OPERATOR__`-prefixed environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&OperatorConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}
