//! Configuration for downstream trigger evaluation.

use cascade_core::{BuildResult, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the downstream trigger engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Upstream results that may trigger downstream pipelines.
    #[serde(default = "default_result_criteria")]
    pub result_criteria: Vec<BuildResult>,
    /// Evaluations slower than this are reported at info level.
    #[serde(default = "default_slow_run_threshold_ms")]
    pub slow_run_threshold_ms: u64,
}

fn default_result_criteria() -> Vec<BuildResult> {
    vec![BuildResult::Success, BuildResult::Unstable]
}

fn default_slow_run_threshold_ms() -> u64 {
    5_000
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            result_criteria: default_result_criteria(),
            slow_run_threshold_ms: default_slow_run_threshold_ms(),
        }
    }
}

impl TriggerConfig {
    /// Load configuration from a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the upstream results that trigger downstream pipelines.
    pub fn with_result_criteria(mut self, criteria: Vec<BuildResult>) -> Self {
        self.result_criteria = criteria;
        self
    }

    /// Set the threshold above which the summary line is logged at info level.
    pub fn with_slow_run_threshold(mut self, threshold: Duration) -> Self {
        self.slow_run_threshold_ms = threshold.as_millis() as u64;
        self
    }

    pub fn slow_run_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_run_threshold_ms)
    }

    pub fn triggers_on(&self, result: BuildResult) -> bool {
        self.result_criteria.contains(&result)
    }
}
