//! Pipeline configuration structures.

use serde::{Deserialize, Serialize};

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of backend slots executing concurrently (pool size).
    pub max_parallel_requests: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallel_requests: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with defaults (one slot per logical CPU).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of concurrent backend slots.
    #[must_use]
    pub fn with_max_parallel_requests(mut self, n: usize) -> Self {
        self.max_parallel_requests = n;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallel_requests == 0 {
            return Err("max_parallel_requests must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse pipeline configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: PipelineConfig =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
