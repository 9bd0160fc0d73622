//! Tuning parameters supplied to the desired-state builder

use serde::{Deserialize, Serialize};

/// Operator tuning parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningParameters {
    /// Probe timing for server pods
    #[serde(default)]
    pub pod: PodTuning,

    /// Internal operator certificate injected into the admin server pod
    #[serde(default)]
    pub internal_operator_cert: Option<String>,
}

/// Probe timing for server pods, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTuning {
    #[serde(default = "default_readiness_initial_delay")]
    pub readiness_probe_initial_delay_seconds: u32,

    #[serde(default = "default_probe_timeout")]
    pub readiness_probe_timeout_seconds: u32,

    #[serde(default = "default_probe_period")]
    pub readiness_probe_period_seconds: u32,

    #[serde(default = "default_liveness_initial_delay")]
    pub liveness_probe_initial_delay_seconds: u32,

    #[serde(default = "default_probe_timeout")]
    pub liveness_probe_timeout_seconds: u32,

    #[serde(default = "default_probe_period")]
    pub liveness_probe_period_seconds: u32,
}

impl Default for PodTuning {
    fn default() -> Self {
        Self {
            readiness_probe_initial_delay_seconds: default_readiness_initial_delay(),
            readiness_probe_timeout_seconds: default_probe_timeout(),
            readiness_probe_period_seconds: default_probe_period(),
            liveness_probe_initial_delay_seconds: default_liveness_initial_delay(),
            liveness_probe_timeout_seconds: default_probe_timeout(),
            liveness_probe_period_seconds: default_probe_period(),
        }
    }
}

// Default value helpers
fn default_readiness_initial_delay() -> u32 {
    2
}

fn default_liveness_initial_delay() -> u32 {
    10
}

fn default_probe_timeout() -> u32 {
    5
}

fn default_probe_period() -> u32 {
    10
}
