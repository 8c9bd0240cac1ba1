//! The five scheduling policies.
//!
//! | Policy | Rank key | Victim | Preempt when |
//! |--------|----------|--------|--------------|
//! | EDF | (deadline, id) | max remaining | incoming deadline < victim deadline |
//! | MLLF | (laxity, id) | max laxity | incoming laxity < victim laxity |
//! | Relaxation | (α·nlax + β·prio, id) | max remaining | 0 ≤ incoming laxity < victim remaining |
//! | Environment | (m·α·nlax + β·prio', id) | max remaining | 0 ≤ incoming laxity < victim remaining |
//! | Predicted | (deadline, laxity, id) | predictor | occupant remaining > incoming remaining |
//!
//! Victim selection uses remaining time as a stand-in for laxity in three
//! of the variants. Context-switch overhead makes the two diverge.

use std::fmt;
use std::sync::Arc;

use super::rules::{
    BasePriority, EffectivePriority, Edf, EnvironmentLaxity, LeastLaxity, NormalizedLaxity,
};
use super::{
    CorePredictor, EvaluationMode, LaxityScope, RuleEngine, SchedulingContext, SchedulingPolicy,
    TieBreaker,
};
use crate::config::{RelaxationWeights, SimConfig};
use crate::models::{CoreSlots, EnvironmentProfile, Task};

fn max_remaining_victim(slots: &CoreSlots, tasks: &[Task], eligible: &[bool]) -> Option<usize> {
    slots.max_slot_by(tasks, eligible, |t| t.remaining_time)
}

fn relaxation_preempts(incoming: &Task, victim: &Task, now: i64) -> bool {
    let laxity = incoming.laxity(now);
    laxity < victim.remaining_time && laxity >= 0
}

// ======================== EDF ========================

/// Earliest Deadline First.
#[derive(Debug, Clone)]
pub struct EdfPolicy {
    engine: RuleEngine,
}

impl EdfPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self {
            engine: RuleEngine::new()
                .with_rule(Edf)
                .with_final_tie_breaker(TieBreaker::ById),
        }
    }
}

impl Default for EdfPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingPolicy for EdfPolicy {
    fn name(&self) -> &'static str {
        "EDF"
    }

    fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn select_victim(
        &self,
        slots: &CoreSlots,
        tasks: &[Task],
        eligible: &[bool],
        _context: &SchedulingContext,
    ) -> Option<usize> {
        max_remaining_victim(slots, tasks, eligible)
    }

    fn should_preempt(&self, incoming: &Task, victim: &Task, _context: &SchedulingContext) -> bool {
        incoming.deadline < victim.deadline
    }
}

// ======================== MLLF ========================

/// Modified Least Laxity First.
#[derive(Debug, Clone)]
pub struct MllfPolicy {
    engine: RuleEngine,
}

impl MllfPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self {
            engine: RuleEngine::new()
                .with_rule(LeastLaxity)
                .with_final_tie_breaker(TieBreaker::ById),
        }
    }
}

impl Default for MllfPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingPolicy for MllfPolicy {
    fn name(&self) -> &'static str {
        "MLLF"
    }

    fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn select_victim(
        &self,
        slots: &CoreSlots,
        tasks: &[Task],
        eligible: &[bool],
        context: &SchedulingContext,
    ) -> Option<usize> {
        let now = context.current_time;
        slots.max_slot_by(tasks, eligible, |t| t.laxity(now))
    }

    fn should_preempt(&self, incoming: &Task, victim: &Task, context: &SchedulingContext) -> bool {
        let now = context.current_time;
        incoming.laxity(now) < victim.laxity(now)
    }
}

// ======================== Weighted relaxation ========================

/// Weighted relaxation: `α · normalized_laxity + β · priority`.
///
/// Ranks by base priority; misses are logged with the environment-remapped
/// priority of the tick they occur at.
#[derive(Debug, Clone)]
pub struct RelaxationPolicy {
    engine: RuleEngine,
    weights: RelaxationWeights,
    profile: EnvironmentProfile,
}

impl RelaxationPolicy {
    /// Creates the policy.
    pub fn new(weights: RelaxationWeights, profile: EnvironmentProfile) -> Self {
        let engine = RuleEngine::new()
            .with_mode(EvaluationMode::Weighted)
            .with_weighted_rule(
                NormalizedLaxity {
                    epsilon: weights.epsilon,
                },
                weights.alpha,
            )
            .with_weighted_rule(BasePriority, weights.beta)
            .with_final_tie_breaker(TieBreaker::ById);
        Self {
            engine,
            weights,
            profile,
        }
    }

    /// Creates the policy from a run configuration.
    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.relaxation, config.environment.clone())
    }

    /// Configured weights.
    pub fn weights(&self) -> RelaxationWeights {
        self.weights
    }
}

impl SchedulingPolicy for RelaxationPolicy {
    fn name(&self) -> &'static str {
        "RELAXATION"
    }

    fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn select_victim(
        &self,
        slots: &CoreSlots,
        tasks: &[Task],
        eligible: &[bool],
        _context: &SchedulingContext,
    ) -> Option<usize> {
        max_remaining_victim(slots, tasks, eligible)
    }

    fn should_preempt(&self, incoming: &Task, victim: &Task, context: &SchedulingContext) -> bool {
        relaxation_preempts(incoming, victim, context.current_time)
    }

    fn logged_priority(&self, task: &Task, context: &SchedulingContext) -> i32 {
        self.profile
            .effective_priority(task.priority, context.condition())
    }

    fn laxity_scope(&self) -> LaxityScope {
        LaxityScope::Ready
    }
}

// ======================== Environment-adaptive relaxation ========================

/// Environment-adaptive relaxation:
/// `multiplier(phase) · α · normalized_laxity + β · remap(priority, phase)`.
///
/// Normalization bounds span not-yet-arrived and ready tasks.
#[derive(Debug, Clone)]
pub struct EnvironmentPolicy {
    engine: RuleEngine,
    profile: EnvironmentProfile,
}

impl EnvironmentPolicy {
    /// Creates the policy.
    pub fn new(profile: EnvironmentProfile) -> Self {
        let engine = RuleEngine::new()
            .with_mode(EvaluationMode::Weighted)
            .with_weighted_rule(
                EnvironmentLaxity {
                    profile: profile.clone(),
                },
                profile.alpha,
            )
            .with_weighted_rule(
                EffectivePriority {
                    profile: profile.clone(),
                },
                profile.beta,
            )
            .with_final_tie_breaker(TieBreaker::ById);
        Self { engine, profile }
    }

    /// Creates the policy from a run configuration.
    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.environment.clone())
    }

    /// Effective priority of a task at the context's tick.
    pub fn effective_priority(&self, task: &Task, context: &SchedulingContext) -> i32 {
        self.profile
            .effective_priority(task.priority, context.condition())
    }
}

impl SchedulingPolicy for EnvironmentPolicy {
    fn name(&self) -> &'static str {
        "ENV-RELAXATION"
    }

    fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn select_victim(
        &self,
        slots: &CoreSlots,
        tasks: &[Task],
        eligible: &[bool],
        _context: &SchedulingContext,
    ) -> Option<usize> {
        max_remaining_victim(slots, tasks, eligible)
    }

    fn should_preempt(&self, incoming: &Task, victim: &Task, context: &SchedulingContext) -> bool {
        relaxation_preempts(incoming, victim, context.current_time)
    }

    fn logged_priority(&self, task: &Task, context: &SchedulingContext) -> i32 {
        self.effective_priority(task, context)
    }

    fn laxity_scope(&self) -> LaxityScope {
        LaxityScope::Pending
    }
}

// ======================== Predictor-guided ========================

/// Places the most urgent ready task on the core an external predictor picks.
///
/// There is no ready-set-wide victim: an occupied predicted slot is taken
/// over only when its occupant has strictly more remaining work.
#[derive(Clone)]
pub struct PredictedPolicy {
    engine: RuleEngine,
    predictor: Arc<dyn CorePredictor>,
}

impl PredictedPolicy {
    /// Creates the policy around a predictor.
    pub fn new(predictor: Arc<dyn CorePredictor>) -> Self {
        Self {
            engine: RuleEngine::new()
                .with_rule(Edf)
                .with_rule(LeastLaxity)
                .with_final_tie_breaker(TieBreaker::ById),
            predictor,
        }
    }
}

impl fmt::Debug for PredictedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictedPolicy")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl SchedulingPolicy for PredictedPolicy {
    fn name(&self) -> &'static str {
        "PREDICTED"
    }

    fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn select_victim(
        &self,
        _slots: &CoreSlots,
        _tasks: &[Task],
        _eligible: &[bool],
        _context: &SchedulingContext,
    ) -> Option<usize> {
        None
    }

    fn should_preempt(&self, incoming: &Task, victim: &Task, _context: &SchedulingContext) -> bool {
        victim.remaining_time > incoming.remaining_time
    }

    fn predictor(&self) -> Option<&dyn CorePredictor> {
        Some(self.predictor.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::LaxityBounds;
    use crate::models::TaskDescriptor;

    fn make_task(id: u32, burst: i64, deadline: i64, priority: i32) -> Task {
        Task::from(&TaskDescriptor::new(id, 0, burst, deadline, priority))
    }

    fn occupied(tasks: &[Task]) -> CoreSlots {
        let mut slots = CoreSlots::new(tasks.len());
        for i in 0..tasks.len() {
            slots.install(i, i);
        }
        slots
    }

    #[test]
    fn test_edf_rank_and_tie_break() {
        let policy = EdfPolicy::new();
        let ctx = SchedulingContext::at_time(0);
        let a = policy.rank_key(&make_task(5, 1, 10, 1), &ctx);
        let b = policy.rank_key(&make_task(2, 9, 10, 1), &ctx);
        assert_eq!(a.scores, vec![10.0]);
        assert_eq!(
            policy.engine().compare_keys(&b, &a),
            std::cmp::Ordering::Less
        );
    }

    #[test]
    fn test_edf_victim_and_preempt() {
        let policy = EdfPolicy::new();
        let ctx = SchedulingContext::at_time(0);
        let tasks = vec![make_task(1, 3, 20, 1), make_task(2, 7, 9, 1), make_task(3, 7, 30, 1)];
        let slots = occupied(&tasks);

        // Max remaining, lowest slot on ties
        let victim = policy.select_victim(&slots, &tasks, &[true; 3], &ctx);
        assert_eq!(victim, Some(1));

        let incoming = make_task(4, 1, 8, 1);
        assert!(policy.should_preempt(&incoming, &tasks[1], &ctx));
        let same_deadline = make_task(5, 1, 9, 1);
        assert!(!policy.should_preempt(&same_deadline, &tasks[1], &ctx));
    }

    #[test]
    fn test_mllf_victim_by_laxity() {
        let policy = MllfPolicy::new();
        let ctx = SchedulingContext::at_time(2);
        // laxities at t=2: 20-2-3=15, 9-2-7=0, 30-2-7=21
        let tasks = vec![make_task(1, 3, 20, 1), make_task(2, 7, 9, 1), make_task(3, 7, 30, 1)];
        let slots = occupied(&tasks);
        assert_eq!(policy.select_victim(&slots, &tasks, &[true; 3], &ctx), Some(2));

        let incoming = make_task(4, 1, 10, 1); // laxity 7
        assert!(policy.should_preempt(&incoming, &tasks[2], &ctx));
        assert!(!policy.should_preempt(&incoming, &tasks[1], &ctx));
    }

    #[test]
    fn test_relaxation_score() {
        let policy =
            RelaxationPolicy::new(RelaxationWeights::new(0.6, 0.4), EnvironmentProfile::default());
        let ctx = SchedulingContext::at_time(0)
            .with_priority_range(4.0)
            .with_laxity_bounds(Some(LaxityBounds { min: 0, max: 8 }));
        // laxity 4 → 4/8·4 = 2 ; 0.6·2 + 0.4·3 = 2.4
        let key = policy.rank_key(&make_task(1, 6, 10, 3), &ctx);
        assert_eq!(key.scores.len(), 1);
        assert!((key.scores[0] - 2.4).abs() < 1e-6);
        assert_eq!(policy.laxity_scope(), LaxityScope::Ready);
        assert!((policy.weights().alpha - 0.6).abs() < 1e-12);
        assert!((policy.weights().beta - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_relaxation_preempt_condition() {
        let policy = RelaxationPolicy::from_config(&SimConfig::default());
        let ctx = SchedulingContext::at_time(0);
        let victim = make_task(1, 8, 40, 1);
        assert!(policy.should_preempt(&make_task(2, 3, 10, 1), &victim, &ctx)); // laxity 7 < 8
        assert!(!policy.should_preempt(&make_task(3, 1, 9, 1), &victim, &ctx)); // laxity 8
        let late = make_task(4, 3, 2, 1); // laxity -1
        assert!(!policy.should_preempt(&late, &victim, &ctx));
    }

    #[test]
    fn test_relaxation_logs_remapped_priority() {
        let policy = RelaxationPolicy::from_config(&SimConfig::default());
        let task = make_task(1, 1, 10, 1);
        let degraded = SchedulingContext::at_time(15).with_horizon(30);
        assert_eq!(policy.logged_priority(&task, &degraded), 3);
        // Ranking uses the base priority
        let key = policy.rank_key(&task, &degraded);
        let ctx_rank = policy.engine().evaluate(&task, &degraded);
        assert!((key.scores[0] - ctx_rank.iter().sum::<f64>()).abs() < 1e-10);
        assert!((ctx_rank[1] - 0.3).abs() < 1e-10);
    }

    #[test]
    fn test_environment_policy() {
        let policy = EnvironmentPolicy::new(EnvironmentProfile::default());
        let task = make_task(1, 1, 40, 1);
        let ctx = SchedulingContext::at_time(12).with_horizon(30);
        assert_eq!(policy.effective_priority(&task, &ctx), 3);
        assert_eq!(policy.logged_priority(&task, &ctx), 3);
        assert_eq!(policy.laxity_scope(), LaxityScope::Pending);

        // Collapsed bounds: midpoint 0.5 · 0.84 + 3 = 3.42
        let key = policy.rank_key(&task, &ctx);
        assert!((key.scores[0] - 3.42).abs() < 1e-10);
    }

    #[test]
    fn test_predicted_policy() {
        let policy = PredictedPolicy::new(Arc::new(|_: &crate::dispatching::FeatureVector| 0_i64));
        let ctx = SchedulingContext::at_time(0);
        assert!(policy.predictor().is_some());

        let tasks = vec![make_task(1, 9, 10, 1)];
        assert_eq!(policy.select_victim(&occupied(&tasks), &tasks, &[true], &ctx), None);
        assert!(policy.should_preempt(&make_task(2, 3, 10, 1), &tasks[0], &ctx));
        assert!(!policy.should_preempt(&make_task(3, 9, 10, 1), &tasks[0], &ctx));

        // (deadline, laxity, id)
        let key = policy.rank_key(&make_task(4, 2, 10, 1), &ctx);
        assert_eq!(key.scores, vec![10.0, 8.0]);
    }
}
