//! Optional per-run trace: occupancy timeline, preemptions, dispatch log.
//!
//! Recording is off by default. When off, every recording call is a no-op
//! and the trace stays empty.

use serde::{Deserialize, Serialize};

use crate::models::TaskId;

/// Slot occupancy during one tick (taken after dispatch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Tick.
    pub time: i64,
    /// Task id per slot, `None` for idle.
    pub occupancy: Vec<Option<TaskId>>,
}

/// One victim eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreemptionEvent {
    /// Tick.
    pub time: i64,
    /// Slot the eviction happened on.
    pub core: usize,
    /// Task installed.
    pub incoming: TaskId,
    /// Task sent back to ready.
    pub outgoing: TaskId,
}

/// One placement of a task on a slot.
///
/// Fields mirror the predictor features, plus the chosen core, so a
/// dispatch log doubles as training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// Run identifier.
    pub run_id: usize,
    /// Task placed.
    pub task_id: TaskId,
    /// Tick.
    pub time: i64,
    /// Remaining time after the context-switch overhead.
    pub remaining_time: i64,
    /// Absolute deadline.
    pub deadline: i64,
    /// Base priority.
    pub priority: i32,
    /// Laxity after the overhead.
    pub laxity: i64,
    /// Slot the task was placed on.
    pub core: usize,
    /// Whether the placement evicted another task.
    pub preempted: bool,
}

/// Recorded history of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    /// Occupancy per tick.
    pub timeline: Vec<TickSnapshot>,
    /// Evictions in order.
    pub preemptions: Vec<PreemptionEvent>,
    /// Placements in order.
    pub dispatches: Vec<DispatchEvent>,
}

impl SimulationTrace {
    /// Occupancy recorded for tick `time`.
    pub fn occupancy_at(&self, time: i64) -> Option<&[Option<TaskId>]> {
        self.timeline
            .iter()
            .find(|s| s.time == time)
            .map(|s| s.occupancy.as_slice())
    }

    /// Ticks during which `task_id` held a slot.
    pub fn running_ticks(&self, task_id: TaskId) -> Vec<i64> {
        self.timeline
            .iter()
            .filter(|s| s.occupancy.contains(&Some(task_id)))
            .map(|s| s.time)
            .collect()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty() && self.preemptions.is_empty() && self.dispatches.is_empty()
    }
}

/// Switchable recorder owned by a run.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tracer {
    enabled: bool,
    trace: SimulationTrace,
}

impl Tracer {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            trace: SimulationTrace::default(),
        }
    }

    pub(crate) fn snapshot(&mut self, time: i64, occupancy: Vec<Option<TaskId>>) {
        if self.enabled {
            self.trace.timeline.push(TickSnapshot { time, occupancy });
        }
    }

    pub(crate) fn preemption(&mut self, event: PreemptionEvent) {
        if self.enabled {
            self.trace.preemptions.push(event);
        }
    }

    pub(crate) fn dispatch(&mut self, event: DispatchEvent) {
        if self.enabled {
            self.trace.dispatches.push(event);
        }
    }

    pub(crate) fn trace(&self) -> &SimulationTrace {
        &self.trace
    }

    pub(crate) fn into_trace(self) -> SimulationTrace {
        self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_tracer_records_nothing() {
        let mut tracer = Tracer::new(false);
        tracer.snapshot(0, vec![Some(1)]);
        tracer.preemption(PreemptionEvent {
            time: 0,
            core: 0,
            incoming: 2,
            outgoing: 1,
        });
        assert!(tracer.into_trace().is_empty());
    }

    #[test]
    fn test_occupancy_queries() {
        let mut tracer = Tracer::new(true);
        tracer.snapshot(0, vec![Some(1), None]);
        tracer.snapshot(1, vec![Some(1), Some(2)]);
        tracer.snapshot(2, vec![None, Some(2)]);
        let trace = tracer.into_trace();

        assert_eq!(trace.occupancy_at(1), Some(&[Some(1), Some(2)][..]));
        assert_eq!(trace.occupancy_at(5), None);
        assert_eq!(trace.running_ticks(1), vec![0, 1]);
        assert_eq!(trace.running_ticks(2), vec![1, 2]);
        assert!(trace.running_ticks(3).is_empty());
    }
}
