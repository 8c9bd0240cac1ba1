//! Built-in dispatching rules.
//!
//! # Categories
//!
//! - **Deadline**: EDF
//! - **Slack**: LLF, normalized laxity, environment-scaled normalized laxity
//! - **Priority**: base priority, environment-remapped priority
//!
//! Relaxation scores are not rules of their own: they are weighted
//! combinations of a laxity rule and a priority rule (see
//! [`RuleEngine`](super::RuleEngine) in weighted mode).
//!
//! # Score Convention
//! All rules return lower scores for more urgent tasks.

use super::{DispatchingRule, RuleScore, SchedulingContext};
use crate::models::{EnvironmentProfile, Task};

// ======================== Deadline rules ========================

/// Earliest Deadline First.
///
/// # Reference
/// Liu & Layland (1973), optimal dynamic-priority rule on a single processor.
#[derive(Debug, Clone, Copy)]
pub struct Edf;

impl DispatchingRule for Edf {
    fn name(&self) -> &'static str {
        "EDF"
    }

    fn evaluate(&self, task: &Task, _context: &SchedulingContext) -> RuleScore {
        task.deadline as f64
    }

    fn description(&self) -> &'static str {
        "Earliest Deadline First"
    }
}

// ======================== Slack rules ========================

/// Least Laxity First.
///
/// Laxity = deadline - current_time - remaining_time.
///
/// # Reference
/// Mok (1983), least-slack scheduling.
#[derive(Debug, Clone, Copy)]
pub struct LeastLaxity;

impl DispatchingRule for LeastLaxity {
    fn name(&self) -> &'static str {
        "LLF"
    }

    fn evaluate(&self, task: &Task, context: &SchedulingContext) -> RuleScore {
        task.laxity(context.current_time) as f64
    }

    fn description(&self) -> &'static str {
        "Least Laxity First"
    }
}

/// Laxity normalized into `[0, priority_range]` over the context's bounds.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedLaxity {
    /// Guard added to the range denominator.
    pub epsilon: f64,
}

impl Default for NormalizedLaxity {
    fn default() -> Self {
        Self { epsilon: 1e-9 }
    }
}

impl DispatchingRule for NormalizedLaxity {
    fn name(&self) -> &'static str {
        "NLAX"
    }

    fn evaluate(&self, task: &Task, context: &SchedulingContext) -> RuleScore {
        context.normalized_laxity(task.laxity(context.current_time), self.epsilon)
    }

    fn description(&self) -> &'static str {
        "Normalized Laxity"
    }
}

/// Normalized laxity scaled by the current environment multiplier.
#[derive(Debug, Clone)]
pub struct EnvironmentLaxity {
    /// Multiplier table and epsilon.
    pub profile: EnvironmentProfile,
}

impl DispatchingRule for EnvironmentLaxity {
    fn name(&self) -> &'static str {
        "ENV-NLAX"
    }

    fn evaluate(&self, task: &Task, context: &SchedulingContext) -> RuleScore {
        let normalized =
            context.normalized_laxity(task.laxity(context.current_time), self.profile.epsilon);
        self.profile.multiplier(context.condition()) * normalized
    }

    fn description(&self) -> &'static str {
        "Environment-Scaled Normalized Laxity"
    }
}

// ======================== Priority rules ========================

/// Base priority. Smaller values rank first.
#[derive(Debug, Clone, Copy)]
pub struct BasePriority;

impl DispatchingRule for BasePriority {
    fn name(&self) -> &'static str {
        "PRIORITY"
    }

    fn evaluate(&self, task: &Task, _context: &SchedulingContext) -> RuleScore {
        task.priority as f64
    }

    fn description(&self) -> &'static str {
        "Base Priority"
    }
}

/// Priority after the environment remap of the current phase.
#[derive(Debug, Clone)]
pub struct EffectivePriority {
    /// Remap tables.
    pub profile: EnvironmentProfile,
}

impl DispatchingRule for EffectivePriority {
    fn name(&self) -> &'static str {
        "ENV-PRIORITY"
    }

    fn evaluate(&self, task: &Task, context: &SchedulingContext) -> RuleScore {
        self.profile
            .effective_priority(task.priority, context.condition()) as f64
    }

    fn description(&self) -> &'static str {
        "Environment-Remapped Priority"
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

    #[test]
    fn test_edf() {
        let ctx = SchedulingContext::at_time(0);
        let early = make_task(1, 3, 10, 1);
        let late = make_task(2, 1, 50, 1);
        assert!(Edf.evaluate(&early, &ctx) < Edf.evaluate(&late, &ctx));
    }

    #[test]
    fn test_least_laxity() {
        let ctx = SchedulingContext::at_time(2);
        // 10 - 2 - 6 = 2
        let urgent = make_task(1, 6, 10, 1);
        // 12 - 2 - 1 = 9
        let relaxed = make_task(2, 1, 12, 1);
        assert!((LeastLaxity.evaluate(&urgent, &ctx) - 2.0).abs() < 1e-10);
        assert!(LeastLaxity.evaluate(&urgent, &ctx) < LeastLaxity.evaluate(&relaxed, &ctx));
    }

    #[test]
    fn test_normalized_laxity() {
        let ctx = SchedulingContext::at_time(0)
            .with_priority_range(3.0)
            .with_laxity_bounds(Some(LaxityBounds { min: 2, max: 8 }));
        let task = make_task(1, 2, 10, 1); // laxity 8
        let score = NormalizedLaxity::default().evaluate(&task, &ctx);
        assert!((score - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_environment_laxity_scaled() {
        let profile = EnvironmentProfile::default();
        let rule = EnvironmentLaxity { profile };
        let task = make_task(1, 2, 12, 1); // laxity 10 at t=0, 5 at t=5
        let bounds = Some(LaxityBounds { min: 0, max: 10 });

        let favorable = SchedulingContext::at_time(0)
            .with_horizon(30)
            .with_laxity_bounds(bounds);
        // 1.25 * (10 / (10 + 1e-5))
        assert!((rule.evaluate(&task, &favorable) - 1.25).abs() < 1e-4);

        let severe = SchedulingContext::at_time(25)
            .with_horizon(30)
            .with_laxity_bounds(bounds);
        // laxity -15: 0.54 * (-15 / 10)
        assert!((rule.evaluate(&task, &severe) + 0.81).abs() < 1e-4);
    }

    #[test]
    fn test_priority_rules() {
        let ctx = SchedulingContext::at_time(12).with_horizon(30); // degraded
        let one = make_task(1, 1, 50, 1);
        let three = make_task(2, 1, 50, 3);
        assert!(BasePriority.evaluate(&one, &ctx) < BasePriority.evaluate(&three, &ctx));

        let rule = EffectivePriority {
            profile: EnvironmentProfile::default(),
        };
        assert!((rule.evaluate(&one, &ctx) - 3.0).abs() < 1e-10);
        assert!((rule.evaluate(&three, &ctx) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_names_and_descriptions() {
        let profile = EnvironmentProfile::default();
        let rules: Vec<Box<dyn DispatchingRule>> = vec![
            Box::new(Edf),
            Box::new(LeastLaxity),
            Box::new(NormalizedLaxity::default()),
            Box::new(EnvironmentLaxity {
                profile: profile.clone(),
            }),
            Box::new(BasePriority),
            Box::new(EffectivePriority { profile }),
        ];
        let described: Vec<(&str, &str)> =
            rules.iter().map(|r| (r.name(), r.description())).collect();
        assert_eq!(described[0], ("EDF", "Earliest Deadline First"));
        assert_eq!(described[1], ("LLF", "Least Laxity First"));
        assert_eq!(described[2].1, "Normalized Laxity");
        assert_eq!(described[3].1, "Environment-Scaled Normalized Laxity");
        assert_eq!(described[4].1, "Base Priority");
        assert_eq!(described[5].1, "Environment-Remapped Priority");
    }
}
