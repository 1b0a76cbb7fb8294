//! Scheduler configuration structures.

use serde::{Deserialize, Serialize};

/// Default nominal quantum in milliseconds. The controller ticks at half
/// this value.
pub const DEFAULT_QUANTUM_MS: u64 = 1000;

/// Default identifier pool capacity.
pub const DEFAULT_MAX_UNITS: usize = 10_000;

/// Scheduler construction parameters.
///
/// The level count is fixed at three and deliberately not configurable;
/// only the base quantum and the admission capacity vary per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Nominal time slice in milliseconds. The internal tick is half of
    /// this, giving finer-grained preemption checks than the nominal
    /// quantum.
    #[serde(default = "default_quantum_ms")]
    pub quantum_ms: u64,
    /// Identifier pool capacity: the maximum number of simultaneously
    /// registered units.
    #[serde(default = "default_max_units")]
    pub max_units: usize,
}

fn default_quantum_ms() -> u64 {
    DEFAULT_QUANTUM_MS
}

fn default_max_units() -> usize {
    DEFAULT_MAX_UNITS
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum_ms: DEFAULT_QUANTUM_MS,
            max_units: DEFAULT_MAX_UNITS,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nominal quantum in milliseconds.
    #[must_use]
    pub fn with_quantum_ms(mut self, quantum_ms: u64) -> Self {
        self.quantum_ms = quantum_ms;
        self
    }

    /// Set the identifier pool capacity.
    #[must_use]
    pub fn with_max_units(mut self, max_units: usize) -> Self {
        self.max_units = max_units;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.quantum_ms == 0 {
            return Err("quantum_ms must be greater than 0".into());
        }
        if self.max_units == 0 {
            return Err("max_units must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
