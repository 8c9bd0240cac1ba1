//! Dispatching rules, rule engine and scheduling policies.
//!
//! A [`DispatchingRule`] scores one task. A [`RuleEngine`] composes rules
//! into an ordering of the ready set. A [`SchedulingPolicy`] wraps an
//! engine with the variant-specific preemption semantics: which occupied
//! slot is the victim and when the best ready task may displace it.
//!
//! # Usage
//!
//! ```
//! use u_rtsim::dispatching::{SchedulingContext, SchedulingPolicy};
//! use u_rtsim::dispatching::policies::EdfPolicy;
//!
//! let policy = EdfPolicy::new();
//! assert_eq!(policy.name(), "EDF");
//! let context = SchedulingContext::at_time(0);
//! // let key = policy.rank_key(&task, &context);
//! ```
//!
//! # References
//!
//! - Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in a
//!   Hard-Real-Time Environment"
//! - Oh & Yang (1998), "A Modified Least-Laxity-First Scheduling Algorithm
//!   for Real-Time Tasks"

mod context;
mod engine;
pub mod policies;
pub mod predictor;
pub mod rules;

pub use context::{LaxityBounds, SchedulingContext};
pub use engine::{EvaluationMode, RankKey, RuleEngine, TieBreaker};
pub use predictor::{CorePredictor, FeatureVector, PredictionStats};

use crate::models::{CoreSlots, Task};
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = more urgent (dispatched first).
pub type RuleScore = f64;

/// A dispatching rule that scores task urgency.
///
/// # Score Convention
/// **Lower score = more urgent.**
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "EDF", "LLF").
    fn name(&self) -> &'static str;

    /// Evaluates a task in the given scheduling context.
    fn evaluate(&self, task: &Task, context: &SchedulingContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// Which tasks span the laxity range used for normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaxityScope {
    /// The policy does not normalize laxity.
    #[default]
    Unused,
    /// Ready tasks only.
    Ready,
    /// Not-yet-arrived and ready tasks.
    Pending,
}

/// A pluggable dispatch policy, selected once per run.
///
/// Policies never mutate tasks. Everything time-dependent is read from the
/// [`SchedulingContext`].
pub trait SchedulingPolicy: Send + Sync + Debug {
    /// Policy name (e.g., "EDF", "MLLF").
    fn name(&self) -> &'static str;

    /// Engine ordering the ready set.
    fn engine(&self) -> &RuleEngine;

    /// Ranking key of a ready task. Ready tasks are sorted ascending by key.
    fn rank_key(&self, task: &Task, context: &SchedulingContext) -> RankKey {
        self.engine().rank_key(task, context)
    }

    /// Ranks the `ready` indices into `tasks`, most urgent first.
    ///
    /// Keys are computed once per task and the sort is stable.
    fn rank(
        &self,
        tasks: &[Task],
        ready: &[usize],
        context: &SchedulingContext,
    ) -> Vec<(usize, RankKey)> {
        let mut keyed: Vec<(usize, RankKey)> = ready
            .iter()
            .map(|&i| (i, self.rank_key(&tasks[i], context)))
            .collect();
        self.engine().order(&mut keyed);
        keyed
    }

    /// Least-deserving occupied slot among the `eligible` ones.
    fn select_victim(
        &self,
        slots: &CoreSlots,
        tasks: &[Task],
        eligible: &[bool],
        context: &SchedulingContext,
    ) -> Option<usize>;

    /// Whether `incoming` may displace `victim`.
    fn should_preempt(&self, incoming: &Task, victim: &Task, context: &SchedulingContext) -> bool;

    /// Priority recorded when `task` misses its deadline.
    fn logged_priority(&self, task: &Task, _context: &SchedulingContext) -> i32 {
        task.priority
    }

    /// Tasks whose laxities bound the normalization range.
    fn laxity_scope(&self) -> LaxityScope {
        LaxityScope::Unused
    }

    /// External predictor, for policies that place tasks by prediction.
    fn predictor(&self) -> Option<&dyn CorePredictor> {
        None
    }
}
