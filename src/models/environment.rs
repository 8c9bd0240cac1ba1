//! Operating-environment model.
//!
//! The horizon is split into three phases of increasing severity. Each
//! phase may permute task priorities and scale the laxity term of the
//! environment-adaptive relaxation score.
//!
//! | Phase | Ticks | Default multiplier | Default remap |
//! |-------|-------|--------------------|---------------|
//! | Favorable | `[0, h/3)` | 1.25 | identity |
//! | Degraded | `[h/3, 2h/3)` | 0.84 | 1↔3 |
//! | Severe | `[2h/3, h)` | 0.54 | 1→2→3→1 |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment phase at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnvironmentCondition {
    /// First third of the horizon.
    Favorable,
    /// Middle third of the horizon.
    Degraded,
    /// Final third of the horizon.
    SeverelyDegraded,
}

impl EnvironmentCondition {
    /// Phase of `time` within a horizon of `horizon` ticks.
    ///
    /// Phase boundaries use integer thirds of the horizon.
    pub fn at(time: i64, horizon: i64) -> Self {
        if time < horizon / 3 {
            EnvironmentCondition::Favorable
        } else if time < 2 * horizon / 3 {
            EnvironmentCondition::Degraded
        } else {
            EnvironmentCondition::SeverelyDegraded
        }
    }
}

/// Tables and weights for environment-adaptive relaxation.
///
/// Remapping is a pure function of base priority and phase; the base
/// priority of a task is never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentProfile {
    /// Weight of the normalized-laxity term.
    pub alpha: f64,
    /// Weight of the (remapped) priority term.
    pub beta: f64,
    /// Guard added to the laxity range denominator.
    pub epsilon: f64,
    /// Laxity-term multiplier per phase.
    pub multipliers: BTreeMap<EnvironmentCondition, f64>,
    /// Multiplier used for a phase missing from `multipliers`.
    pub default_multiplier: f64,
    /// Priority permutation per phase (`base -> effective`).
    pub remap: BTreeMap<EnvironmentCondition, BTreeMap<i32, i32>>,
}

impl Default for EnvironmentProfile {
    fn default() -> Self {
        let multipliers = BTreeMap::from([
            (EnvironmentCondition::Favorable, 1.25),
            (EnvironmentCondition::Degraded, 0.84),
            (EnvironmentCondition::SeverelyDegraded, 0.54),
        ]);
        let remap = BTreeMap::from([
            (EnvironmentCondition::Degraded, BTreeMap::from([(1, 3), (3, 1)])),
            (
                EnvironmentCondition::SeverelyDegraded,
                BTreeMap::from([(1, 2), (2, 3), (3, 1)]),
            ),
        ]);
        Self {
            alpha: 1.0,
            beta: 1.0,
            epsilon: 1e-5,
            multipliers,
            default_multiplier: 1.0,
            remap,
        }
    }
}

impl EnvironmentProfile {
    /// Laxity multiplier for a phase.
    pub fn multiplier(&self, condition: EnvironmentCondition) -> f64 {
        self.multipliers
            .get(&condition)
            .copied()
            .unwrap_or(self.default_multiplier)
    }

    /// Effective priority of `base` under `condition`.
    ///
    /// Priorities absent from the phase table pass through unchanged.
    pub fn effective_priority(&self, base: i32, condition: EnvironmentCondition) -> i32 {
        self.remap
            .get(&condition)
            .and_then(|table| table.get(&base))
            .copied()
            .unwrap_or(base)
    }

    /// Sets the α/β weights.
    pub fn with_weights(mut self, alpha: f64, beta: f64) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    /// Sets the multiplier for one phase.
    pub fn with_multiplier(mut self, condition: EnvironmentCondition, value: f64) -> Self {
        self.multipliers.insert(condition, value);
        self
    }

    /// Replaces the remap table of one phase.
    pub fn with_remap(mut self, condition: EnvironmentCondition, table: BTreeMap<i32, i32>) -> Self {
        self.remap.insert(condition, table);
        self
    }
}
