//! Clock & admission stage: arrivals, then expiry.
//!
//! Arrival runs before expiry so a task whose laxity is already negative
//! when it arrives is dropped in the same tick.

use tracing::debug;

use super::kpi::{MissCause, MissEvent, RunStats};
use super::state::RunState;
use crate::dispatching::{SchedulingContext, SchedulingPolicy};
use crate::models::TaskState;

/// Moves every task arriving at `now` into the ready set, in input order.
///
/// Returns the number of arrivals. Each arrival is one movement.
pub(crate) fn admit_arrivals(state: &mut RunState, now: i64, stats: &mut RunStats) -> usize {
    let tasks = &mut state.tasks;
    let ready = &mut state.ready;
    let before = ready.len();

    state.not_arrived.retain(|&idx| {
        if tasks[idx].arrival_time == now {
            tasks[idx].state = TaskState::Ready;
            ready.push(idx);
            false
        } else {
            true
        }
    });

    let arrived = ready.len() - before;
    stats.movements += arrived as u64;
    arrived
}

/// Drops every ready task with negative laxity at the context's time.
///
/// Each drop is a deadline miss logged with the policy's priority and one
/// movement. Returns the number of drops.
pub(crate) fn expire_ready(
    state: &mut RunState,
    policy: &dyn SchedulingPolicy,
    context: &SchedulingContext,
    stats: &mut RunStats,
) -> usize {
    let now = context.current_time;
    let tasks = &mut state.tasks;
    let dropped = &mut state.dropped;
    let before = dropped.len();

    state.ready.retain(|&idx| {
        let task = &mut tasks[idx];
        let laxity = task.laxity(now);
        if laxity >= 0 {
            return true;
        }
        let priority = policy.logged_priority(task, context);
        task.state = TaskState::Dropped;
        dropped.push(idx);
        stats.record_miss(MissEvent {
            task_id: task.id,
            time: now,
            priority,
            cause: MissCause::Expired,
        });
        debug!(task_id = task.id, time = now, laxity, priority, "task expired");
        false
    });

    let expired = dropped.len() - before;
    stats.movements += expired as u64;
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::policies::{EdfPolicy, RelaxationPolicy};
    use crate::models::{Task, TaskDescriptor};

    fn state_of(descs: &[TaskDescriptor]) -> RunState {
        RunState::new(0, descs.iter().map(Task::from).collect(), 1)
    }

    #[test]
    fn test_arrivals_in_input_order() {
        let mut state = state_of(&[
            TaskDescriptor::new(5, 1, 2, 10, 1),
            TaskDescriptor::new(3, 0, 2, 10, 1),
            TaskDescriptor::new(4, 1, 2, 10, 1),
        ]);
        let mut stats = RunStats::new(0, 3, 10, 1);

        assert_eq!(admit_arrivals(&mut state, 0, &mut stats), 1);
        assert_eq!(state.ready, vec![1]);
        assert_eq!(admit_arrivals(&mut state, 1, &mut stats), 2);
        assert_eq!(state.ready, vec![1, 0, 2]);
        assert!(state.not_arrived.is_empty());
        assert_eq!(stats.movements, 3);
        assert!(state.check_invariants(1).is_ok());
    }

    #[test]
    fn test_expiry_drops_negative_laxity() {
        // Laxity at t=0: 2 - 0 - 5 = -3
        let mut state = state_of(&[
            TaskDescriptor::new(1, 0, 5, 2, 4),
            TaskDescriptor::new(2, 0, 2, 2, 1),
        ]);
        let mut stats = RunStats::new(0, 2, 10, 1);
        admit_arrivals(&mut state, 0, &mut stats);

        let policy = EdfPolicy::new();
        let ctx = SchedulingContext::at_time(0).with_horizon(10);
        assert_eq!(expire_ready(&mut state, &policy, &ctx, &mut stats), 1);

        // Laxity exactly 0 survives
        assert_eq!(state.ready, vec![1]);
        assert_eq!(state.dropped, vec![0]);
        assert_eq!(stats.deadline_misses, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.missed_priorities(), vec![4]);
        // 2 arrivals + 1 drop
        assert_eq!(stats.movements, 3);
        assert!(state.check_invariants(0).is_ok());
    }

    #[test]
    fn test_expiry_logs_remapped_priority() {
        let mut state = state_of(&[TaskDescriptor::new(1, 12, 5, 15, 1)]);
        let mut stats = RunStats::new(0, 1, 30, 1);
        admit_arrivals(&mut state, 12, &mut stats);

        let policy = RelaxationPolicy::new(Default::default(), Default::default());
        let ctx = SchedulingContext::at_time(12).with_horizon(30);
        expire_ready(&mut state, &policy, &ctx, &mut stats);

        assert_eq!(stats.misses[0].cause, MissCause::Expired);
        assert_eq!(stats.misses[0].priority, 3);
        // Base priority untouched
        assert_eq!(state.tasks[0].priority, 1);
    }
}
