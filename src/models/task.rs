//! Task model.
//!
//! A [`TaskDescriptor`] is the immutable input handed over by a task-set
//! source. At run start each accepted descriptor becomes a [`Task`], the
//! run-local working copy that carries the mutable simulation state.
//!
//! # Time Representation
//! All times are integer ticks. Laxity is never cached: it is a pure
//! function of the task state and the tick it is evaluated at.

use serde::{Deserialize, Serialize};

/// Task identifier. Unique within a task set, not globally.
pub type TaskId = u32;

/// Input descriptor `(id, arrival_time, burst_time, deadline, priority)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Task identifier.
    pub id: TaskId,
    /// Tick at which the task becomes eligible.
    pub arrival_time: i64,
    /// Total execution demand in ticks.
    pub burst_time: i64,
    /// Absolute tick by which completion is required.
    pub deadline: i64,
    /// Base priority.
    pub priority: i32,
}

impl TaskDescriptor {
    /// Creates a descriptor.
    pub fn new(id: TaskId, arrival_time: i64, burst_time: i64, deadline: i64, priority: i32) -> Self {
        Self {
            id,
            arrival_time,
            burst_time,
            deadline,
            priority,
        }
    }
}

/// Set membership of a task within a run.
///
/// A task is in exactly one state at any tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for its arrival tick.
    NotArrived,
    /// Admitted and waiting for a core.
    Ready,
    /// Occupying the given core slot.
    Running(usize),
    /// Finished; `completion_time` is set.
    Completed,
    /// Removed without finishing (expired or rejected).
    Dropped,
}

/// Run-local working copy of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Tick at which the task becomes eligible.
    pub arrival_time: i64,
    /// Total execution demand (immutable).
    pub burst_time: i64,
    /// Absolute deadline.
    pub deadline: i64,
    /// Base priority. Never overwritten; policies derive effective values.
    pub priority: i32,
    /// Execution demand left, including context-switch overhead added so far.
    pub remaining_time: i64,
    /// Tick of completion, `None` until the task finishes.
    pub completion_time: Option<i64>,
    /// Last ranking score computed for this task, if ranked.
    pub relaxation: Option<f64>,
    /// Current set membership.
    pub state: TaskState,
}

impl Task {
    /// Creates the working copy of a descriptor in the not-arrived state.
    pub fn from_descriptor(desc: &TaskDescriptor) -> Self {
        Self {
            id: desc.id,
            arrival_time: desc.arrival_time,
            burst_time: desc.burst_time,
            deadline: desc.deadline,
            priority: desc.priority,
            remaining_time: desc.burst_time,
            completion_time: None,
            relaxation: None,
            state: TaskState::NotArrived,
        }
    }

    /// Laxity at `now`: `deadline - now - remaining_time`.
    pub fn laxity(&self, now: i64) -> i64 {
        self.deadline - now - self.remaining_time
    }

    /// Response time (`completion - arrival`), once completed.
    pub fn response_time(&self) -> Option<i64> {
        self.completion_time.map(|c| c - self.arrival_time)
    }

    /// Whether the task finished after its deadline.
    pub fn is_late(&self) -> bool {
        self.completion_time.is_some_and(|c| c > self.deadline)
    }

    /// Whether the task has been dropped.
    pub fn is_dropped(&self) -> bool {
        self.state == TaskState::Dropped
    }
}

impl From<&TaskDescriptor> for Task {
    fn from(desc: &TaskDescriptor) -> Self {
        Task::from_descriptor(desc)
    }
}
