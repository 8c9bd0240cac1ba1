//! Rule engine for multi-criteria ranking.
//!
//! Composes dispatching rules either lexicographically (sequential) or as a
//! weighted sum, and breaks remaining ties deterministically.

use std::cmp::Ordering;
use std::sync::Arc;

use super::{DispatchingRule, RuleScore, SchedulingContext};
use crate::models::{Task, TaskId};

/// How multiple rules are combined.
#[derive(Debug, Clone, Default)]
pub enum EvaluationMode {
    /// Apply rules in sequence; use next rule only on ties.
    #[default]
    Sequential,
    /// Compute weighted sum of all rule scores.
    Weighted,
}

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Leave tied tasks in their current order.
    #[default]
    NextRule,
    /// Deterministic by task ID, ascending.
    ById,
}

/// Orderable ranking value of one task at one tick.
///
/// Sequential engines produce one score per rule; weighted engines produce
/// a single combined score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankKey {
    /// Scores in rule order. Lower = more urgent.
    pub scores: Vec<RuleScore>,
    /// Task the key belongs to.
    pub id: TaskId,
}

#[derive(Clone)]
struct WeightedRule {
    rule: Arc<dyn DispatchingRule>,
    weight: f64,
}

/// A composable rule engine for ready-queue ordering.
///
/// # Example
/// ```
/// use u_rtsim::dispatching::{RuleEngine, TieBreaker};
/// use u_rtsim::dispatching::rules;
///
/// let engine = RuleEngine::new()
///     .with_rule(rules::Edf)
///     .with_final_tie_breaker(TieBreaker::ById);
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<WeightedRule>,
    mode: EvaluationMode,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl RuleEngine {
    /// Creates an empty rule engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            mode: EvaluationMode::Sequential,
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// Adds a primary rule (weight 1.0).
    pub fn with_rule<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 1.0,
        });
        self
    }

    /// Adds a weighted rule.
    pub fn with_weighted_rule<R: DispatchingRule + 'static>(
        mut self,
        rule: R,
        weight: f64,
    ) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight,
        });
        self
    }

    /// Sets the evaluation mode.
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Names of the configured rules, in order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.rule.name()).collect()
    }

    /// Evaluates a single task and returns scores from each rule.
    pub fn evaluate(&self, task: &Task, context: &SchedulingContext) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(task, context) * wr.weight)
            .collect()
    }

    /// Computes the ranking key of a task.
    ///
    /// Sequential mode keeps one raw score per rule; weighted mode folds
    /// the weighted scores into one.
    pub fn rank_key(&self, task: &Task, context: &SchedulingContext) -> RankKey {
        let scores = match &self.mode {
            EvaluationMode::Sequential => self
                .rules
                .iter()
                .map(|wr| wr.rule.evaluate(task, context))
                .collect(),
            EvaluationMode::Weighted => vec![self.evaluate(task, context).into_iter().sum()],
        };
        RankKey {
            scores,
            id: task.id,
        }
    }

    /// Orders two keys: score by score within epsilon, then the tie-breaker.
    pub fn compare_keys(&self, a: &RankKey, b: &RankKey) -> Ordering {
        let decided = a
            .scores
            .iter()
            .zip(&b.scores)
            .find(|(sa, sb)| (*sa - *sb).abs() > self.epsilon);
        if let Some((sa, sb)) = decided {
            return sa.partial_cmp(sb).unwrap_or(Ordering::Equal);
        }

        match &self.tie_breaker {
            TieBreaker::NextRule => Ordering::Equal,
            TieBreaker::ById => a.id.cmp(&b.id),
        }
    }

    /// Stable sort of keyed entries, most urgent first.
    pub fn order<T>(&self, keyed: &mut [(T, RankKey)]) {
        keyed.sort_by(|(_, a), (_, b)| self.compare_keys(a, b));
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}(w={})", r.rule.name(), r.weight))
                    .collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .field("tie_breaker", &self.tie_breaker)
            .finish()
    }
}
