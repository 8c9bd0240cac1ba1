//! Scheduling context for rule evaluation.

use crate::models::EnvironmentCondition;

/// Laxity range over the task population used for normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaxityBounds {
    /// Smallest laxity observed.
    pub min: i64,
    /// Largest laxity observed.
    pub max: i64,
}

impl LaxityBounds {
    /// Bounds of a laxity sequence, `None` if it is empty.
    pub fn from_laxities(laxities: impl IntoIterator<Item = i64>) -> Option<Self> {
        laxities.into_iter().fold(None, |acc, l| match acc {
            None => Some(Self { min: l, max: l }),
            Some(b) => Some(Self {
                min: b.min.min(l),
                max: b.max.max(l),
            }),
        })
    }
}

/// Per-tick state passed to dispatching rules.
///
/// The current tick is always explicit; no rule reads time from anywhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingContext {
    /// Current tick.
    pub current_time: i64,
    /// Run horizon in ticks. `0` = unknown (treated as favorable environment).
    pub horizon: i64,
    /// Largest base priority in the task set (≥ 1).
    pub priority_range: f64,
    /// Laxity range for normalization, if any tasks were in scope.
    pub laxity_bounds: Option<LaxityBounds>,
}

impl Default for SchedulingContext {
    fn default() -> Self {
        Self {
            current_time: 0,
            horizon: 0,
            priority_range: 1.0,
            laxity_bounds: None,
        }
    }
}

impl SchedulingContext {
    /// Creates a context at the given tick.
    pub fn at_time(current_time: i64) -> Self {
        Self {
            current_time,
            ..Default::default()
        }
    }

    /// Sets the run horizon.
    pub fn with_horizon(mut self, horizon: i64) -> Self {
        self.horizon = horizon;
        self
    }

    /// Sets the priority range.
    pub fn with_priority_range(mut self, range: f64) -> Self {
        self.priority_range = range;
        self
    }

    /// Sets the laxity bounds.
    pub fn with_laxity_bounds(mut self, bounds: Option<LaxityBounds>) -> Self {
        self.laxity_bounds = bounds;
        self
    }

    /// Environment phase at the current tick.
    pub fn condition(&self) -> EnvironmentCondition {
        if self.horizon <= 0 {
            EnvironmentCondition::Favorable
        } else {
            EnvironmentCondition::at(self.current_time, self.horizon)
        }
    }

    /// Maps a laxity into `[0, priority_range]`.
    ///
    /// `(laxity - min) / (max - min + ε) · priority_range`. A collapsed or
    /// missing range yields the midpoint `priority_range / 2`.
    pub fn normalized_laxity(&self, laxity: i64, epsilon: f64) -> f64 {
        let midpoint = self.priority_range / 2.0;
        let Some(bounds) = self.laxity_bounds else {
            return midpoint;
        };
        let range = bounds.max as f64 - bounds.min as f64;
        if range.abs() < epsilon {
            return midpoint;
        }
        (laxity as f64 - bounds.min as f64) / (range + epsilon) * self.priority_range
    }
}
