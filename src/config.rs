//! Trainer configuration for ALICE-PLSA

use crate::{ALICEPLSAError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// EM loop settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Iteration ceiling; 0 returns the initial model untouched
    pub max_iterations: usize,
    /// Stop once the likelihood gain drops below this
    pub epsilon: f64,
    /// Freeze P(z) and P(w|z), re-estimate only P(d|z)
    pub folding_in: bool,
    /// Accumulate the E-step with per-worker partial tables
    pub parallel: bool,
    /// Completed iterations between progress notifications
    pub progress_interval: usize,
}

impl TrainerConfig {
    /// Default iteration ceiling for full training
    pub const DEFAULT_MAX_ITERATIONS: usize = 500;
    /// Default iteration ceiling for folding-in
    pub const FOLDING_IN_MAX_ITERATIONS: usize = 50;
    pub const DEFAULT_EPSILON: f64 = 0.01;
    pub const DEFAULT_PROGRESS_INTERVAL: usize = 5;

    /// Full training with default limits
    pub fn new() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            epsilon: Self::DEFAULT_EPSILON,
            folding_in: false,
            parallel: false,
            progress_interval: Self::DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Folding-in preset
    pub fn folding_in() -> Self {
        Self {
            max_iterations: Self::FOLDING_IN_MAX_ITERATIONS,
            folding_in: true,
            ..Self::new()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_folding_in(mut self, folding_in: bool) -> Self {
        self.folding_in = folding_in;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_progress_interval(mut self, progress_interval: usize) -> Self {
        self.progress_interval = progress_interval;
        self
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.epsilon.is_nan() {
            return Err(ALICEPLSAError::InvalidConfiguration(
                "epsilon must not be NaN".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(ALICEPLSAError::InvalidConfiguration(
                "progress interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrainerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self::new()
    }
}
