//! Run-local task sets and core slots.

use crate::models::{CoreSlots, Task, TaskId, TaskState};
use crate::SimError;

/// Sizes of the five membership sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Membership {
    /// Not yet arrived.
    pub not_arrived: usize,
    /// Waiting for a slot.
    pub ready: usize,
    /// Holding a slot.
    pub running: usize,
    /// Finished.
    pub completed: usize,
    /// Expired or rejected.
    pub dropped: usize,
}

impl Membership {
    /// Sum over all sets.
    pub fn total(&self) -> usize {
        self.not_arrived + self.ready + self.running + self.completed + self.dropped
    }
}

/// Everything a run mutates. Sets hold indices into `tasks`.
#[derive(Debug, Clone)]
pub(crate) struct RunState {
    pub(crate) run_id: usize,
    pub(crate) tasks: Vec<Task>,
    pub(crate) not_arrived: Vec<usize>,
    pub(crate) ready: Vec<usize>,
    pub(crate) slots: CoreSlots,
    pub(crate) completed: Vec<usize>,
    pub(crate) dropped: Vec<usize>,
}

impl RunState {
    pub(crate) fn new(run_id: usize, tasks: Vec<Task>, core_count: usize) -> Self {
        let not_arrived = (0..tasks.len())
            .filter(|&i| tasks[i].state == TaskState::NotArrived)
            .collect();
        let dropped = (0..tasks.len())
            .filter(|&i| tasks[i].state == TaskState::Dropped)
            .collect();
        Self {
            run_id,
            tasks,
            not_arrived,
            ready: Vec::new(),
            slots: CoreSlots::new(core_count),
            completed: Vec::new(),
            dropped,
        }
    }

    pub(crate) fn membership(&self) -> Membership {
        Membership {
            not_arrived: self.not_arrived.len(),
            ready: self.ready.len(),
            running: self.slots.occupied_count(),
            completed: self.completed.len(),
            dropped: self.dropped.len(),
        }
    }

    pub(crate) fn occupancy(&self) -> Vec<Option<TaskId>> {
        self.slots
            .iter()
            .map(|(_, idx)| idx.map(|i| self.tasks[i].id))
            .collect()
    }

    /// Checks that every task sits in exactly one set matching its state.
    pub(crate) fn check_invariants(&self, time: i64) -> Result<(), SimError> {
        let mut seen = vec![false; self.tasks.len()];
        let mut visit = |idx: usize, expected: TaskState, set: &str| -> Result<(), SimError> {
            let task = self.tasks.get(idx).ok_or_else(|| {
                SimError::invariant(time, format!("{set} holds unknown index {idx}"))
            })?;
            if std::mem::replace(&mut seen[idx], true) {
                return Err(SimError::invariant(
                    time,
                    format!("task {} appears in more than one set", task.id),
                ));
            }
            if task.state != expected {
                return Err(SimError::invariant(
                    time,
                    format!("task {} in {set} has state {:?}", task.id, task.state),
                ));
            }
            Ok(())
        };

        for &i in &self.not_arrived {
            visit(i, TaskState::NotArrived, "not-arrived")?;
        }
        for &i in &self.ready {
            visit(i, TaskState::Ready, "ready")?;
        }
        for (slot, i) in self.slots.occupied() {
            visit(i, TaskState::Running(slot), "core")?;
        }
        for &i in &self.completed {
            visit(i, TaskState::Completed, "completed")?;
        }
        for &i in &self.dropped {
            visit(i, TaskState::Dropped, "dropped")?;
        }

        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(SimError::invariant(
                time,
                format!("task {} is in no set", self.tasks[missing].id),
            ));
        }
        if let Some(task) = self.tasks.iter().find(|t| t.remaining_time < 0) {
            return Err(SimError::invariant(
                time,
                format!("task {} has negative remaining time", task.id),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskDescriptor;

    fn state() -> RunState {
        let tasks = vec![
            Task::from(&TaskDescriptor::new(1, 0, 2, 10, 1)),
            Task::from(&TaskDescriptor::new(2, 1, 2, 10, 1)),
        ];
        RunState::new(0, tasks, 1)
    }

    #[test]
    fn test_initial_membership() {
        let s = state();
        assert_eq!(s.membership().not_arrived, 2);
        assert_eq!(s.membership().total(), 2);
        assert!(s.check_invariants(0).is_ok());
        assert_eq!(s.occupancy(), vec![None]);
    }

    #[test]
    fn test_duplicate_membership_detected() {
        let mut s = state();
        s.ready.push(0);
        assert!(matches!(
            s.check_invariants(3),
            Err(SimError::InvariantViolation { time: 3, .. })
        ));
    }

    #[test]
    fn test_state_mismatch_detected() {
        let mut s = state();
        s.not_arrived.retain(|&i| i != 0);
        s.slots.install(0, 0);
        // state still NotArrived
        assert!(s.check_invariants(0).is_err());

        s.tasks[0].state = TaskState::Running(0);
        assert!(s.check_invariants(0).is_ok());
        assert_eq!(s.occupancy(), vec![Some(1)]);
    }

    #[test]
    fn test_lost_task_detected() {
        let mut s = state();
        s.not_arrived.pop();
        assert!(s.check_invariants(0).is_err());
    }
}
