//! Core dispatcher: idle-fill, one preemption, predicted placement.
//!
//! # Algorithm
//!
//! Ranked policies:
//! 1. Every idle slot (in index order) takes the head of the ranked ready
//!    set. Placement adds the context-switch overhead.
//! 2. At most one preemption: the policy picks a victim among slots *not*
//!    filled in step 1; if the head of ready may displace it, the victim
//!    goes back to ready and the head takes its slot.
//!
//! Predictor policies visit idle slots in index order and offer the head of
//! ready to the predictor. The predicted slot is used when idle, or when its
//! occupant (not placed this tick) holds strictly more remaining work than
//! the candidate. Otherwise the candidate lands on the idle slot under
//! consideration.
//!
//! Movements: one per placement, one per eviction.

use tracing::{debug, warn};

use super::kpi::RunStats;
use super::state::RunState;
use super::trace::{DispatchEvent, PreemptionEvent, Tracer};
use crate::dispatching::predictor::resolve_prediction;
use crate::dispatching::{CorePredictor, FeatureVector, SchedulingContext, SchedulingPolicy};
use crate::models::TaskState;
use crate::SimError;

/// Places ready tasks on core slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreDispatcher {
    context_switch: i64,
}

impl CoreDispatcher {
    /// Creates a dispatcher charging `context_switch` ticks per placement.
    pub fn new(context_switch: i64) -> Self {
        Self { context_switch }
    }

    /// Context-switch overhead per placement.
    pub fn context_switch(&self) -> i64 {
        self.context_switch
    }

    /// Runs the dispatch phase of one tick. `state.ready` must already be
    /// ranked, most urgent first.
    pub(crate) fn dispatch(
        &self,
        state: &mut RunState,
        policy: &dyn SchedulingPolicy,
        context: &SchedulingContext,
        stats: &mut RunStats,
        tracer: &mut Tracer,
    ) -> Result<(), SimError> {
        match policy.predictor() {
            Some(predictor) => {
                self.dispatch_predicted(state, policy, predictor, context, stats, tracer)
            }
            None => {
                let filled = self.fill_idle(state, context, stats, tracer)?;
                self.preempt_once(state, policy, context, &filled, stats, tracer)
            }
        }
    }

    /// Fills idle slots from the head of ready. Returns which slots were filled.
    fn fill_idle(
        &self,
        state: &mut RunState,
        context: &SchedulingContext,
        stats: &mut RunStats,
        tracer: &mut Tracer,
    ) -> Result<Vec<bool>, SimError> {
        let mut filled = vec![false; state.slots.len()];
        for (slot, was_filled) in filled.iter_mut().enumerate() {
            if state.ready.is_empty() {
                break;
            }
            if !state.slots.is_idle(slot) {
                continue;
            }
            let idx = state.ready.remove(0);
            self.place(state, slot, idx, false, context, stats, tracer)?;
            *was_filled = true;
        }
        Ok(filled)
    }

    fn preempt_once(
        &self,
        state: &mut RunState,
        policy: &dyn SchedulingPolicy,
        context: &SchedulingContext,
        filled: &[bool],
        stats: &mut RunStats,
        tracer: &mut Tracer,
    ) -> Result<(), SimError> {
        let Some(&best) = state.ready.first() else {
            return Ok(());
        };
        let eligible: Vec<bool> = filled.iter().map(|f| !f).collect();
        let Some(slot) = policy.select_victim(&state.slots, &state.tasks, &eligible, context) else {
            return Ok(());
        };
        let victim = state.slots.get(slot).ok_or_else(|| {
            SimError::invariant(context.current_time, format!("victim slot {slot} is idle"))
        })?;
        if !policy.should_preempt(&state.tasks[best], &state.tasks[victim], context) {
            return Ok(());
        }

        state.ready.remove(0);
        self.preempt(state, slot, best, context, stats, tracer)
    }

    fn dispatch_predicted(
        &self,
        state: &mut RunState,
        policy: &dyn SchedulingPolicy,
        predictor: &dyn CorePredictor,
        context: &SchedulingContext,
        stats: &mut RunStats,
        tracer: &mut Tracer,
    ) -> Result<(), SimError> {
        let now = context.current_time;
        let core_count = state.slots.len();
        let mut filled = vec![false; core_count];

        for slot in 0..core_count {
            let Some(&candidate) = state.ready.first() else {
                break;
            };
            if !state.slots.is_idle(slot) {
                continue;
            }

            let features = FeatureVector::from_task(state.run_id, &state.tasks[candidate], now);
            let raw = predictor.predict(&features);
            stats.predictions.attempted += 1;
            let predicted = resolve_prediction(raw, core_count);
            if predicted.is_none() {
                stats.predictions.invalid += 1;
                warn!(
                    run_id = state.run_id,
                    task_id = state.tasks[candidate].id,
                    time = now,
                    prediction = raw,
                    core_count,
                    "predicted core out of range, falling back"
                );
            }

            state.ready.remove(0);
            let target = match predicted {
                Some(p) if state.slots.is_idle(p) => {
                    self.place(state, p, candidate, false, context, stats, tracer)?;
                    p
                }
                Some(p) if !filled[p] => {
                    let occupant = state.slots.get(p).ok_or_else(|| {
                        SimError::invariant(now, format!("slot {p} is neither idle nor occupied"))
                    })?;
                    if policy.should_preempt(&state.tasks[candidate], &state.tasks[occupant], context)
                    {
                        self.preempt(state, p, candidate, context, stats, tracer)?;
                        p
                    } else {
                        self.place(state, slot, candidate, false, context, stats, tracer)?;
                        slot
                    }
                }
                _ => {
                    self.place(state, slot, candidate, false, context, stats, tracer)?;
                    slot
                }
            };

            filled[target] = true;
            if predicted == Some(target) {
                stats.predictions.matched += 1;
            }
        }
        Ok(())
    }

    /// Evicts the occupant of `slot` to the back of ready and installs `incoming`.
    fn preempt(
        &self,
        state: &mut RunState,
        slot: usize,
        incoming: usize,
        context: &SchedulingContext,
        stats: &mut RunStats,
        tracer: &mut Tracer,
    ) -> Result<(), SimError> {
        let now = context.current_time;
        let outgoing = state
            .slots
            .release(slot)
            .ok_or_else(|| SimError::invariant(now, format!("no task to evict on slot {slot}")))?;
        state.tasks[outgoing].state = TaskState::Ready;
        state.ready.push(outgoing);
        stats.movements += 1;

        self.place(state, slot, incoming, true, context, stats, tracer)?;
        stats.preemptions += 1;

        let event = PreemptionEvent {
            time: now,
            core: slot,
            incoming: state.tasks[incoming].id,
            outgoing: state.tasks[outgoing].id,
        };
        debug!(
            time = now,
            core = slot,
            incoming = event.incoming,
            outgoing = event.outgoing,
            "preemption"
        );
        tracer.preemption(event);
        Ok(())
    }

    /// Installs `idx` on an idle `slot`, charging the context switch.
    #[allow(clippy::too_many_arguments)]
    fn place(
        &self,
        state: &mut RunState,
        slot: usize,
        idx: usize,
        preempted: bool,
        context: &SchedulingContext,
        stats: &mut RunStats,
        tracer: &mut Tracer,
    ) -> Result<(), SimError> {
        let now = context.current_time;
        if let Some(prev) = state.slots.install(slot, idx) {
            return Err(SimError::invariant(
                now,
                format!(
                    "slot {slot} already holds task {} when placing task {}",
                    state.tasks[prev].id, state.tasks[idx].id
                ),
            ));
        }

        let task = &mut state.tasks[idx];
        task.remaining_time = task.remaining_time.saturating_add(self.context_switch);
        task.state = TaskState::Running(slot);
        stats.movements += 1;

        tracer.dispatch(DispatchEvent {
            run_id: state.run_id,
            task_id: task.id,
            time: now,
            remaining_time: task.remaining_time,
            deadline: task.deadline,
            priority: task.priority,
            laxity: task.laxity(now),
            core: slot,
            preempted,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::policies::{EdfPolicy, MllfPolicy, PredictedPolicy};
    use crate::models::{Task, TaskDescriptor};
    use std::sync::Arc;

    fn ready_state(descs: &[TaskDescriptor], cores: usize) -> RunState {
        let tasks: Vec<Task> = descs.iter().map(Task::from).collect();
        let mut state = RunState::new(0, tasks, cores);
        state.ready = std::mem::take(&mut state.not_arrived);
        for &i in &state.ready {
            state.tasks[i].state = TaskState::Ready;
        }
        state
    }

    fn run(
        state: &mut RunState,
        policy: &dyn SchedulingPolicy,
        now: i64,
        context_switch: i64,
    ) -> (RunStats, Tracer) {
        let mut stats = RunStats::new(0, state.tasks.len(), 10, state.slots.len());
        let mut tracer = Tracer::new(true);
        let ctx = SchedulingContext::at_time(now).with_horizon(10);
        CoreDispatcher::new(context_switch)
            .dispatch(state, policy, &ctx, &mut stats, &mut tracer)
            .unwrap();
        (stats, tracer)
    }

    #[test]
    fn test_idle_fill_charges_overhead() {
        let mut state = ready_state(
            &[
                TaskDescriptor::new(1, 0, 3, 5, 1),
                TaskDescriptor::new(2, 0, 4, 8, 1),
                TaskDescriptor::new(3, 0, 4, 9, 1),
            ],
            2,
        );
        let (stats, tracer) = run(&mut state, &EdfPolicy::new(), 0, 1);

        assert_eq!(state.occupancy(), vec![Some(1), Some(2)]);
        assert_eq!(state.ready, vec![2]);
        assert_eq!(state.tasks[0].remaining_time, 4);
        assert_eq!(state.tasks[1].remaining_time, 5);
        assert_eq!(stats.movements, 2);
        // Slots just filled are not preemption targets
        assert_eq!(stats.preemptions, 0);
        assert_eq!(tracer.trace().dispatches.len(), 2);
        assert!(state.check_invariants(0).is_ok());
    }

    #[test]
    fn test_overhead_saturates() {
        let mut state = ready_state(&[TaskDescriptor::new(1, 0, i64::MAX - 1, i64::MAX, 1)], 1);
        let (stats, tracer) = run(&mut state, &EdfPolicy::new(), 0, 2);

        assert_eq!(CoreDispatcher::new(2).context_switch(), 2);
        assert_eq!(state.occupancy(), vec![Some(1)]);
        assert_eq!(state.tasks[0].remaining_time, i64::MAX);
        assert_eq!(stats.movements, 1);
        assert_eq!(tracer.trace().dispatches[0].laxity, 0);
    }

    #[test]
    fn test_single_preemption_per_tick() {
        let mut state = ready_state(
            &[
                TaskDescriptor::new(1, 0, 5, 20, 1),
                TaskDescriptor::new(2, 0, 6, 30, 1),
                TaskDescriptor::new(3, 0, 1, 4, 1),
                TaskDescriptor::new(4, 0, 1, 5, 1),
            ],
            2,
        );
        // Slots already busy with tasks 1 and 2
        state.ready = vec![2, 3];
        state.slots.install(0, 0);
        state.slots.install(1, 1);
        state.tasks[0].state = TaskState::Running(0);
        state.tasks[1].state = TaskState::Running(1);

        let (stats, tracer) = run(&mut state, &EdfPolicy::new(), 1, 0);

        // Victim is the max-remaining slot (task 2 on slot 1)
        assert_eq!(stats.preemptions, 1);
        assert_eq!(state.occupancy(), vec![Some(1), Some(3)]);
        assert_eq!(state.ready, vec![3, 1]);
        assert_eq!(stats.movements, 2);
        let event = tracer.trace().preemptions[0];
        assert_eq!((event.core, event.incoming, event.outgoing), (1, 3, 2));
        assert!(state.check_invariants(1).is_ok());
    }

    #[test]
    fn test_no_preemption_when_condition_fails() {
        let mut state = ready_state(
            &[
                TaskDescriptor::new(1, 0, 5, 10, 1),
                TaskDescriptor::new(2, 0, 1, 12, 1),
            ],
            1,
        );
        state.ready = vec![1];
        state.slots.install(0, 0);
        state.tasks[0].state = TaskState::Running(0);

        let (stats, _) = run(&mut state, &EdfPolicy::new(), 1, 1);
        assert_eq!(stats.preemptions, 0);
        assert_eq!(state.occupancy(), vec![Some(1)]);

        // MLLF: laxity 12-1-1=10 vs 10-1-5=4, no preemption either
        let (stats, _) = run(&mut state, &MllfPolicy::new(), 1, 1);
        assert_eq!(stats.preemptions, 0);
    }

    #[test]
    fn test_predicted_invalid_index_falls_back() {
        let policy = PredictedPolicy::new(Arc::new(|_: &FeatureVector| 7_i64));
        let mut state = ready_state(
            &[
                TaskDescriptor::new(1, 0, 2, 10, 1),
                TaskDescriptor::new(2, 0, 2, 12, 1),
            ],
            2,
        );
        let (stats, _) = run(&mut state, &policy, 0, 1);

        assert_eq!(state.occupancy(), vec![Some(1), Some(2)]);
        assert_eq!(stats.predictions.attempted, 2);
        assert_eq!(stats.predictions.invalid, 2);
        assert_eq!(stats.predictions.matched, 0);

        let negative = PredictedPolicy::new(Arc::new(|_: &FeatureVector| -1_i64));
        let mut state = ready_state(&[TaskDescriptor::new(1, 0, 2, 10, 1)], 1);
        let (stats, _) = run(&mut state, &negative, 0, 1);
        assert_eq!(state.occupancy(), vec![Some(1)]);
        assert_eq!(stats.predictions.invalid, 1);
    }

    #[test]
    fn test_predicted_idle_target() {
        let policy = PredictedPolicy::new(Arc::new(|_: &FeatureVector| 1_i64));
        let mut state = ready_state(
            &[
                TaskDescriptor::new(1, 0, 2, 10, 1),
                TaskDescriptor::new(2, 0, 2, 12, 1),
            ],
            2,
        );
        let (stats, _) = run(&mut state, &policy, 0, 1);

        // Task 1 goes to predicted slot 1; slot 1 is then occupied, so the
        // loop moves past it and task 2 waits.
        assert_eq!(state.occupancy(), vec![None, Some(1)]);
        assert_eq!(state.ready, vec![1]);
        assert_eq!(stats.predictions.attempted, 1);
        assert_eq!(stats.predictions.matched, 1);
    }

    #[test]
    fn test_predicted_never_evicts_same_tick_placement() {
        // Predicts 0 for everything; slot 0 is filled first.
        let policy = PredictedPolicy::new(Arc::new(|_: &FeatureVector| 0_i64));
        let mut state = ready_state(
            &[
                TaskDescriptor::new(1, 0, 9, 20, 1),
                TaskDescriptor::new(2, 0, 1, 25, 1),
            ],
            2,
        );
        let (stats, _) = run(&mut state, &policy, 0, 0);

        assert_eq!(state.occupancy(), vec![Some(1), Some(2)]);
        assert_eq!(stats.preemptions, 0);
        assert_eq!(stats.predictions.attempted, 2);
        assert_eq!(stats.predictions.matched, 1);
    }

    #[test]
    fn test_predicted_eviction() {
        let policy = PredictedPolicy::new(Arc::new(|_: &FeatureVector| 1_i64));
        let mut state = ready_state(
            &[
                TaskDescriptor::new(1, 0, 8, 30, 1),
                TaskDescriptor::new(2, 0, 1, 10, 1),
            ],
            2,
        );
        state.ready = vec![1];
        state.slots.install(1, 0);
        state.tasks[0].state = TaskState::Running(1);

        let (stats, tracer) = run(&mut state, &policy, 1, 1);

        assert_eq!(stats.preemptions, 1);
        assert_eq!(stats.movements, 2);
        assert_eq!(state.occupancy(), vec![None, Some(2)]);
        assert_eq!(state.ready, vec![0]);
        assert_eq!(stats.predictions.matched, 1);
        assert!(tracer.trace().dispatches[0].preempted);
        assert!(state.check_invariants(1).is_ok());
    }
}
