//! Run statistics and result records.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Preemptions | Victim evictions |
//! | Deadline misses | Expired + late + unfinished + rejected |
//! | Movements | Set-membership changes (arrival, drop, placement, eviction) |
//! | Busy time | Occupied slot-ticks |
//! | WCRT | max(completion - arrival) over completed tasks |
//! | Makespan | Latest completion time (0 if none) |
//! | Utilization | busy / (horizon × cores) × 100 |

use serde::{Deserialize, Serialize};

use crate::dispatching::PredictionStats;
use crate::models::TaskId;

/// Why a task counted as a deadline miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissCause {
    /// Dropped from the ready set with negative laxity.
    Expired,
    /// Completed after its deadline.
    Late,
    /// Still ready or running when the horizon ran out.
    Unfinished,
    /// Malformed descriptor rejected at admission.
    Rejected,
}

/// One deadline miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissEvent {
    /// Task that missed.
    pub task_id: TaskId,
    /// Tick the miss was recorded at.
    pub time: i64,
    /// Priority logged for the miss (possibly environment-remapped).
    pub priority: i32,
    /// Miss category.
    pub cause: MissCause,
}

/// Utilization in percent, `0` when the denominator is zero.
pub fn utilization_pct(busy_time: u64, slot_ticks: u64) -> f64 {
    if slot_ticks == 0 {
        0.0
    } else {
        busy_time as f64 / slot_ticks as f64 * 100.0
    }
}

/// Statistics of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Run (task set) identifier.
    pub run_id: usize,
    /// Descriptors supplied, including rejected ones.
    pub task_count: usize,
    /// Horizon the run was simulated over.
    pub horizon: i64,
    /// Number of core slots.
    pub core_count: usize,
    /// Victim evictions.
    pub preemptions: u64,
    /// Deadline misses of every cause.
    pub deadline_misses: u64,
    /// Set-membership changes.
    pub movements: u64,
    /// Occupied slot-ticks.
    pub busy_time: u64,
    /// Worst-case response time so far.
    pub worst_case_response_time: i64,
    /// Latest completion time so far.
    pub makespan: i64,
    /// Tasks completed.
    pub completed: usize,
    /// Tasks dropped by expiry.
    pub dropped: usize,
    /// Descriptors rejected at admission.
    pub rejected: usize,
    /// Tasks left ready or running at the end.
    pub unfinished: usize,
    /// Deadline misses in the order recorded.
    pub misses: Vec<MissEvent>,
    /// Predictor fidelity (zero unless a predictor policy ran).
    pub predictions: PredictionStats,
}

impl RunStats {
    /// Creates empty statistics for a run.
    pub fn new(run_id: usize, task_count: usize, horizon: i64, core_count: usize) -> Self {
        Self {
            run_id,
            task_count,
            horizon,
            core_count,
            preemptions: 0,
            deadline_misses: 0,
            movements: 0,
            busy_time: 0,
            worst_case_response_time: 0,
            makespan: 0,
            completed: 0,
            dropped: 0,
            rejected: 0,
            unfinished: 0,
            misses: Vec::new(),
            predictions: PredictionStats::default(),
        }
    }

    /// Records a deadline miss.
    pub fn record_miss(&mut self, event: MissEvent) {
        self.deadline_misses += 1;
        match event.cause {
            MissCause::Expired => self.dropped += 1,
            MissCause::Rejected => self.rejected += 1,
            MissCause::Unfinished => self.unfinished += 1,
            MissCause::Late => {}
        }
        self.misses.push(event);
    }

    /// Records a completion at `completion_time` of a task that arrived at `arrival_time`.
    pub fn record_completion(&mut self, arrival_time: i64, completion_time: i64) {
        self.completed += 1;
        self.worst_case_response_time = self
            .worst_case_response_time
            .max(completion_time - arrival_time);
        self.makespan = self.makespan.max(completion_time);
    }

    /// Logged priorities of all misses, in order.
    pub fn missed_priorities(&self) -> Vec<i32> {
        self.misses.iter().map(|m| m.priority).collect()
    }

    /// Slot-ticks available over the run.
    pub fn capacity(&self) -> u64 {
        self.horizon.max(0) as u64 * self.core_count as u64
    }

    /// `busy_time / (horizon × core_count) × 100`, guarded against zero.
    pub fn utilization_pct(&self) -> f64 {
        utilization_pct(self.busy_time, self.capacity())
    }

    /// Flat record for result sinks.
    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            task_count: self.task_count,
            preemptions: self.preemptions,
            deadline_misses: self.deadline_misses,
            movements: self.movements,
            utilization_pct: self.utilization_pct(),
            makespan: self.makespan,
            worst_case_response_time: self.worst_case_response_time,
            missed_priorities: self.missed_priorities(),
        }
    }
}

/// Per-run result record in fixed column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: usize,
    /// Descriptors supplied.
    pub task_count: usize,
    /// Preemptions.
    pub preemptions: u64,
    /// Deadline misses.
    pub deadline_misses: u64,
    /// Movements.
    pub movements: u64,
    /// Utilization (0..=100).
    pub utilization_pct: f64,
    /// Makespan.
    pub makespan: i64,
    /// Worst-case response time.
    pub worst_case_response_time: i64,
    /// Logged priorities of missed tasks.
    pub missed_priorities: Vec<i32>,
}

impl RunRecord {
    /// Column names in record order.
    pub const COLUMNS: [&'static str; 9] = [
        "run_id",
        "task_count",
        "preemptions",
        "deadline_misses",
        "movements",
        "utilization_pct",
        "makespan",
        "worst_case_response_time",
        "missed_priorities",
    ];
}

/// Sums over many independent runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrandTotals {
    /// Runs absorbed.
    pub runs: usize,
    /// Descriptors across runs.
    pub task_count: usize,
    /// Preemptions across runs.
    pub preemptions: u64,
    /// Deadline misses across runs.
    pub deadline_misses: u64,
    /// Movements across runs.
    pub movements: u64,
    /// Busy slot-ticks across runs.
    pub busy_time: u64,
    /// Slot-ticks available across runs.
    pub capacity: u64,
    /// Predictor fidelity across runs.
    pub predictions: PredictionStats,
}

impl GrandTotals {
    /// Adds one run.
    pub fn absorb(&mut self, stats: &RunStats) {
        self.runs += 1;
        self.task_count += stats.task_count;
        self.preemptions += stats.preemptions;
        self.deadline_misses += stats.deadline_misses;
        self.movements += stats.movements;
        self.busy_time += stats.busy_time;
        self.capacity += stats.capacity();
        self.predictions += stats.predictions;
    }

    /// Totals of a sequence of runs.
    pub fn from_runs<'a>(runs: impl IntoIterator<Item = &'a RunStats>) -> Self {
        runs.into_iter().fold(Self::default(), |mut acc, s| {
            acc.absorb(s);
            acc
        })
    }

    /// `total busy / (horizon × cores × runs) × 100`.
    pub fn utilization_pct(&self) -> f64 {
        utilization_pct(self.busy_time, self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn miss(task_id: TaskId, priority: i32, cause: MissCause) -> MissEvent {
        MissEvent {
            task_id,
            time: 3,
            priority,
            cause,
        }
    }

    #[test]
    fn test_record_miss_categories() {
        let mut stats = RunStats::new(0, 4, 10, 1);
        stats.record_miss(miss(1, 2, MissCause::Expired));
        stats.record_miss(miss(2, 3, MissCause::Late));
        stats.record_miss(miss(3, 1, MissCause::Unfinished));
        stats.record_miss(miss(4, 5, MissCause::Rejected));

        assert_eq!(stats.deadline_misses, 4);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.unfinished, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.missed_priorities(), vec![2, 3, 1, 5]);
    }

    #[test]
    fn test_wcrt_and_makespan() {
        let mut stats = RunStats::new(0, 3, 20, 2);
        stats.record_completion(0, 4);
        assert_eq!(stats.worst_case_response_time, 4);
        stats.record_completion(5, 7);
        assert_eq!(stats.worst_case_response_time, 4);
        assert_eq!(stats.makespan, 7);
        stats.record_completion(1, 9);
        assert_eq!(stats.worst_case_response_time, 8);
        assert_eq!(stats.makespan, 9);
        assert_eq!(stats.completed, 3);
    }

    #[test]
    fn test_utilization() {
        let mut stats = RunStats::new(0, 1, 10, 2);
        stats.busy_time = 5;
        assert!((stats.utilization_pct() - 25.0).abs() < 1e-10);

        let empty = RunStats::new(0, 0, 10, 0);
        assert!(empty.utilization_pct().abs() < 1e-10);
        assert!(utilization_pct(3, 0).abs() < 1e-10);
    }

    #[test]
    fn test_record_columns() {
        let mut stats = RunStats::new(7, 2, 10, 1);
        stats.busy_time = 4;
        stats.record_miss(miss(1, 2, MissCause::Late));
        let record = stats.to_record();
        assert_eq!(record.run_id, 7);
        assert!((record.utilization_pct - 40.0).abs() < 1e-10);
        assert_eq!(record.missed_priorities, vec![2]);

        let json = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect();
        let mut expected = RunRecord::COLUMNS.to_vec();
        expected.sort_unstable();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_grand_totals() {
        let mut a = RunStats::new(0, 3, 10, 2);
        a.busy_time = 10;
        a.preemptions = 2;
        a.predictions.attempted = 4;
        a.predictions.matched = 2;
        let mut b = RunStats::new(1, 5, 10, 2);
        b.busy_time = 20;
        b.deadline_misses = 1;

        let totals = GrandTotals::from_runs([&a, &b]);
        assert_eq!(totals.runs, 2);
        assert_eq!(totals.task_count, 8);
        assert_eq!(totals.preemptions, 2);
        assert_eq!(totals.deadline_misses, 1);
        // 30 / (10 · 2 · 2)
        assert!((totals.utilization_pct() - 75.0).abs() < 1e-10);
        assert!((totals.predictions.accuracy_pct() - 50.0).abs() < 1e-10);

        // Order of absorption does not matter
        assert_eq!(GrandTotals::from_runs([&b, &a]), totals);
        assert!(GrandTotals::default().utilization_pct().abs() < 1e-10);
    }
}
