//! Simulation configuration.
//!
//! Everything the engine consumes is supplied here rather than hard-coded,
//! so edge configurations (zero overhead, a one-tick horizon) can be
//! exercised directly.

use serde::{Deserialize, Serialize};

use crate::models::EnvironmentProfile;
use crate::validation;
use crate::SimError;

/// α/β weights of the weighted relaxation score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationWeights {
    /// Weight of the normalized-laxity term.
    pub alpha: f64,
    /// Weight of the priority term.
    pub beta: f64,
    /// Guard added to the laxity range denominator.
    pub epsilon: f64,
}

impl Default for RelaxationWeights {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            beta: 0.3,
            epsilon: 1e-9,
        }
    }
}

impl RelaxationWeights {
    /// Creates weights with the default epsilon.
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            ..Default::default()
        }
    }
}

/// Parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of execution slots.
    pub core_count: usize,
    /// Number of ticks simulated per run.
    pub horizon: i64,
    /// Ticks added to a task's remaining time on every placement.
    pub context_switch: i64,
    /// Weights of the weighted relaxation policy.
    pub relaxation: RelaxationWeights,
    /// Tables of the environment-adaptive policy.
    pub environment: EnvironmentProfile,
    /// Record occupancy, preemption and dispatch traces.
    pub record_trace: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            core_count: 2,
            horizon: 50,
            context_switch: 1,
            relaxation: RelaxationWeights::default(),
            environment: EnvironmentProfile::default(),
            record_trace: false,
        }
    }
}

impl SimConfig {
    /// Creates a configuration with the given core count and horizon.
    pub fn new(core_count: usize, horizon: i64) -> Self {
        Self {
            core_count,
            horizon,
            ..Default::default()
        }
    }

    /// Sets the context-switch overhead.
    pub fn with_context_switch(mut self, ticks: i64) -> Self {
        self.context_switch = ticks;
        self
    }

    /// Sets the weighted relaxation weights.
    pub fn with_relaxation(mut self, weights: RelaxationWeights) -> Self {
        self.relaxation = weights;
        self
    }

    /// Sets the environment profile.
    pub fn with_environment(mut self, environment: EnvironmentProfile) -> Self {
        self.environment = environment;
        self
    }

    /// Enables or disables trace recording.
    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    /// Fails fast on a configuration that cannot describe a run.
    pub fn validate(&self) -> Result<(), SimError> {
        validation::validate_config(self)
    }
}
