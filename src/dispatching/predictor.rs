//! External core-assignment predictor.
//!
//! A trained classifier lives outside this crate. The simulator only knows
//! its contract: a six-value feature vector in, a core index out. Any
//! integer is accepted as a prediction and validated against the real core
//! count before use.

use serde::{Deserialize, Serialize};

use crate::models::Task;

/// Features offered to the predictor for one candidate task.
///
/// Order matches [`FeatureVector::to_array`]:
/// `[task_set_id, time, remaining_time, deadline, priority, laxity]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Run (task set) identifier.
    pub task_set_id: i64,
    /// Current tick.
    pub time: i64,
    /// Candidate's remaining execution demand.
    pub remaining_time: i64,
    /// Candidate's absolute deadline.
    pub deadline: i64,
    /// Candidate's base priority.
    pub priority: i64,
    /// Candidate's laxity at `time`.
    pub laxity: i64,
}

impl FeatureVector {
    /// Builds the features of `task` at tick `now`.
    pub fn from_task(task_set_id: usize, task: &Task, now: i64) -> Self {
        Self {
            task_set_id: task_set_id as i64,
            time: now,
            remaining_time: task.remaining_time,
            deadline: task.deadline,
            priority: i64::from(task.priority),
            laxity: task.laxity(now),
        }
    }

    /// Flat feature array in model input order.
    pub fn to_array(&self) -> [i64; 6] {
        [
            self.task_set_id,
            self.time,
            self.remaining_time,
            self.deadline,
            self.priority,
            self.laxity,
        ]
    }
}

/// Capability that suggests a target core for a task.
///
/// Implementations must not rely on being called a fixed number of times;
/// the simulator calls it once per idle slot it tries to fill.
pub trait CorePredictor: Send + Sync {
    /// Suggests a core index. Any value is allowed.
    fn predict(&self, features: &FeatureVector) -> i64;
}

impl<F> CorePredictor for F
where
    F: Fn(&FeatureVector) -> i64 + Send + Sync,
{
    fn predict(&self, features: &FeatureVector) -> i64 {
        self(features)
    }
}

/// Validates a raw prediction against the core count.
pub fn resolve_prediction(raw: i64, core_count: usize) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&core| core < core_count)
}

/// Prediction fidelity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionStats {
    /// Predictions requested.
    pub attempted: u64,
    /// Placements that landed on the predicted slot.
    pub matched: u64,
    /// Predictions outside `0..core_count`.
    pub invalid: u64,
}

impl PredictionStats {
    /// Matched / attempted as a percentage (0 when nothing was attempted).
    pub fn accuracy_pct(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.matched as f64 / self.attempted as f64 * 100.0
        }
    }
}

impl std::ops::AddAssign for PredictionStats {
    fn add_assign(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.matched += other.matched;
        self.invalid += other.invalid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskDescriptor;

    #[test]
    fn test_feature_vector() {
        let mut task = Task::from(&TaskDescriptor::new(3, 1, 4, 12, 2));
        task.remaining_time = 5;
        let f = FeatureVector::from_task(7, &task, 3);
        assert_eq!(f.to_array(), [7, 3, 5, 12, 2, 4]);
    }

    #[test]
    fn test_closure_predictor() {
        let predictor = |f: &FeatureVector| f.time % 2;
        let f = FeatureVector::from_task(0, &Task::from(&TaskDescriptor::new(1, 0, 1, 5, 1)), 3);
        assert_eq!(predictor.predict(&f), 1);
    }

    #[test]
    fn test_resolve_prediction() {
        assert_eq!(resolve_prediction(0, 2), Some(0));
        assert_eq!(resolve_prediction(1, 2), Some(1));
        assert_eq!(resolve_prediction(2, 2), None);
        assert_eq!(resolve_prediction(-1, 2), None);
        assert_eq!(resolve_prediction(i64::MAX, 2), None);
        assert_eq!(resolve_prediction(0, 0), None);
    }

    #[test]
    fn test_accuracy() {
        assert!(PredictionStats::default().accuracy_pct().abs() < 1e-10);

        let mut stats = PredictionStats {
            attempted: 4,
            matched: 3,
            invalid: 1,
        };
        assert!((stats.accuracy_pct() - 75.0).abs() < 1e-10);

        stats += PredictionStats {
            attempted: 4,
            matched: 1,
            invalid: 0,
        };
        assert_eq!(stats.attempted, 8);
        assert!((stats.accuracy_pct() - 50.0).abs() < 1e-10);
    }
}
