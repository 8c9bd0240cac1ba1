//! Tick-driven simulation of one task set, and batches of task sets.
//!
//! # Tick order
//!
//! ```text
//! arrival → expiry → ranking → idle-fill → preemption → execution
//! ```
//!
//! Every transition of a tick is applied before the clock advances. After
//! the last tick, tasks still ready or running count as deadline misses.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use super::admission;
use super::dispatcher::CoreDispatcher;
use super::kpi::{GrandTotals, MissCause, MissEvent, RunRecord, RunStats};
use super::state::{Membership, RunState};
use super::trace::{SimulationTrace, Tracer};
use crate::config::SimConfig;
use crate::dispatching::{LaxityBounds, LaxityScope, SchedulingContext, SchedulingPolicy};
use crate::models::{Task, TaskDescriptor, TaskId, TaskState};
use crate::validation::partition_task_set;
use crate::SimError;

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Counters and miss log.
    pub stats: RunStats,
    /// Recorded trace (empty unless tracing was enabled).
    pub trace: SimulationTrace,
    /// Final state of every task, accepted first, then rejected.
    pub tasks: Vec<Task>,
}

impl RunOutcome {
    /// Flat record for result sinks.
    pub fn record(&self) -> RunRecord {
        self.stats.to_record()
    }

    /// Final state of a task by id.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// One task set being simulated.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use u_rtsim::config::SimConfig;
/// use u_rtsim::dispatching::policies::EdfPolicy;
/// use u_rtsim::models::TaskDescriptor;
/// use u_rtsim::scheduler::SimulationRun;
///
/// let config = SimConfig::new(1, 10);
/// let tasks = [TaskDescriptor::new(1, 0, 3, 5, 1)];
/// let mut run = SimulationRun::new(0, &tasks, &config, Arc::new(EdfPolicy::new())).unwrap();
///
/// run.step().unwrap();
/// assert_eq!(run.occupancy(), vec![Some(1)]);
///
/// let outcome = run.finish().unwrap();
/// assert_eq!(outcome.task(1).unwrap().completion_time, Some(3));
/// ```
#[derive(Debug)]
pub struct SimulationRun {
    config: SimConfig,
    policy: Arc<dyn SchedulingPolicy>,
    dispatcher: CoreDispatcher,
    state: RunState,
    stats: RunStats,
    tracer: Tracer,
    clock: i64,
    priority_range: f64,
}

impl SimulationRun {
    /// Prepares a run. Malformed descriptors are rejected here and logged as
    /// misses; an invalid configuration is an error.
    pub fn new(
        run_id: usize,
        tasks: &[TaskDescriptor],
        config: &SimConfig,
        policy: Arc<dyn SchedulingPolicy>,
    ) -> Result<Self, SimError> {
        config.validate()?;

        let partition = partition_task_set(tasks);
        let priority_range = partition
            .accepted
            .iter()
            .map(|d| d.priority)
            .max()
            .unwrap_or(1)
            .max(1) as f64;

        let mut stats = RunStats::new(run_id, tasks.len(), config.horizon, config.core_count);
        let start = SchedulingContext::at_time(0)
            .with_horizon(config.horizon)
            .with_priority_range(priority_range);

        let mut runtime: Vec<Task> = partition.accepted.iter().map(Task::from).collect();
        for (desc, problem) in &partition.rejected {
            let mut task = Task::from(desc);
            task.state = TaskState::Dropped;
            task.remaining_time = task.remaining_time.max(0);
            let priority = policy.logged_priority(&task, &start);
            stats.record_miss(MissEvent {
                task_id: desc.id,
                time: 0,
                priority,
                cause: MissCause::Rejected,
            });
            warn!(
                run_id,
                task_id = desc.id,
                kind = ?problem.kind,
                reason = %problem.message,
                "task descriptor rejected"
            );
            runtime.push(task);
        }

        info!(
            run_id,
            policy = policy.name(),
            tasks = tasks.len(),
            rejected = partition.rejected.len(),
            cores = config.core_count,
            horizon = config.horizon,
            "simulation run started"
        );

        Ok(Self {
            config: config.clone(),
            dispatcher: CoreDispatcher::new(config.context_switch),
            state: RunState::new(run_id, runtime, config.core_count),
            tracer: Tracer::new(config.record_trace),
            policy,
            stats,
            clock: 0,
            priority_range,
        })
    }

    /// Run identifier.
    pub fn run_id(&self) -> usize {
        self.state.run_id
    }

    /// Next tick to simulate.
    pub fn current_time(&self) -> i64 {
        self.clock
    }

    /// Whether every tick of the horizon has been simulated.
    pub fn is_finished(&self) -> bool {
        self.clock >= self.config.horizon
    }

    /// Task id per core slot, `None` for idle.
    pub fn occupancy(&self) -> Vec<Option<TaskId>> {
        self.state.occupancy()
    }

    /// Ids of ready tasks in their current order.
    pub fn ready(&self) -> Vec<TaskId> {
        self.state.ready.iter().map(|&i| self.state.tasks[i].id).collect()
    }

    /// Sizes of the membership sets.
    pub fn membership(&self) -> Membership {
        self.state.membership()
    }

    /// Current state of every task.
    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    /// Current state of a task by id.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    /// Statistics so far.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Trace so far.
    pub fn trace(&self) -> &SimulationTrace {
        self.tracer.trace()
    }

    /// Simulates one tick. Returns `false` once the horizon is exhausted.
    pub fn step(&mut self) -> Result<bool, SimError> {
        if self.is_finished() {
            return Ok(false);
        }
        let now = self.clock;
        if let Err(err) = self.tick(now) {
            error!(run_id = self.state.run_id, time = now, %err, "simulation aborted");
            return Err(err);
        }
        self.clock += 1;
        Ok(true)
    }

    /// Runs the remaining ticks, reconciles unfinished work and returns the outcome.
    pub fn finish(mut self) -> Result<RunOutcome, SimError> {
        while self.step()? {}
        self.reconcile();

        info!(
            run_id = self.state.run_id,
            policy = self.policy.name(),
            completed = self.stats.completed,
            deadline_misses = self.stats.deadline_misses,
            preemptions = self.stats.preemptions,
            movements = self.stats.movements,
            utilization_pct = self.stats.utilization_pct(),
            wcrt = self.stats.worst_case_response_time,
            "simulation run finished"
        );

        Ok(RunOutcome {
            stats: self.stats,
            trace: self.tracer.into_trace(),
            tasks: self.state.tasks,
        })
    }

    fn context_at(&self, time: i64) -> SchedulingContext {
        SchedulingContext::at_time(time)
            .with_horizon(self.config.horizon)
            .with_priority_range(self.priority_range)
    }

    fn tick(&mut self, now: i64) -> Result<(), SimError> {
        let base = self.context_at(now);
        let scope = self.policy.laxity_scope();
        // Pending bounds are taken before admission, so tasks expiring this
        // tick still widen the range.
        let pending_bounds = match scope {
            LaxityScope::Pending => self.laxity_bounds(scope, now),
            _ => None,
        };
        admission::admit_arrivals(&mut self.state, now, &mut self.stats);
        admission::expire_ready(&mut self.state, self.policy.as_ref(), &base, &mut self.stats);

        let bounds = match scope {
            LaxityScope::Pending => pending_bounds,
            _ => self.laxity_bounds(scope, now),
        };
        let context = base.with_laxity_bounds(bounds);
        self.rank_ready(&context);
        self.dispatcher.dispatch(
            &mut self.state,
            self.policy.as_ref(),
            &context,
            &mut self.stats,
            &mut self.tracer,
        )?;

        let occupancy = self.state.occupancy();
        trace!(run_id = self.state.run_id, time = now, ?occupancy, "tick");
        self.tracer.snapshot(now, occupancy);

        self.execute(&context);
        self.state.check_invariants(now)
    }

    fn laxity_bounds(&self, scope: LaxityScope, now: i64) -> Option<LaxityBounds> {
        let tasks = &self.state.tasks;
        match scope {
            LaxityScope::Unused => None,
            LaxityScope::Ready => {
                LaxityBounds::from_laxities(self.state.ready.iter().map(|&i| tasks[i].laxity(now)))
            }
            LaxityScope::Pending => LaxityBounds::from_laxities(
                self.state
                    .not_arrived
                    .iter()
                    .chain(&self.state.ready)
                    .map(|&i| tasks[i].laxity(now)),
            ),
        }
    }

    /// Sorts ready ascending by rank key and stores each task's leading score.
    fn rank_ready(&mut self, context: &SchedulingContext) {
        let keyed = self
            .policy
            .rank(&self.state.tasks, &self.state.ready, context);
        for (i, key) in &keyed {
            self.state.tasks[*i].relaxation = key.scores.first().copied();
        }
        self.state.ready = keyed.into_iter().map(|(i, _)| i).collect();
    }

    /// Advances every occupied slot by one tick and closes out completions.
    fn execute(&mut self, context: &SchedulingContext) {
        let now = context.current_time;
        let running: Vec<(usize, usize)> = self.state.slots.occupied().collect();

        for (slot, idx) in running {
            self.stats.busy_time += 1;
            let task = &mut self.state.tasks[idx];
            task.remaining_time = (task.remaining_time - 1).max(0);
            if task.remaining_time > 0 {
                continue;
            }

            task.completion_time = Some(now);
            task.state = TaskState::Completed;
            let (task_id, arrival, deadline) = (task.id, task.arrival_time, task.deadline);
            self.state.slots.release(slot);
            self.state.completed.push(idx);
            self.stats.record_completion(arrival, now);

            let late = now > deadline;
            if late {
                let priority = self.policy.logged_priority(&self.state.tasks[idx], context);
                self.stats.record_miss(MissEvent {
                    task_id,
                    time: now,
                    priority,
                    cause: MissCause::Late,
                });
            }
            debug!(
                run_id = self.state.run_id,
                task_id,
                time = now,
                response_time = now - arrival,
                late,
                "task completed"
            );
        }
    }

    /// Counts tasks left ready or running as misses.
    fn reconcile(&mut self) {
        let last = (self.config.horizon - 1).max(0);
        let context = self.context_at(last);
        let pending: Vec<usize> = self
            .state
            .ready
            .iter()
            .copied()
            .chain(self.state.slots.occupied().map(|(_, i)| i))
            .collect();

        for idx in pending {
            let task = &self.state.tasks[idx];
            let priority = self.policy.logged_priority(task, &context);
            self.stats.record_miss(MissEvent {
                task_id: task.id,
                time: last,
                priority,
                cause: MissCause::Unfinished,
            });
            debug!(
                run_id = self.state.run_id,
                task_id = task.id,
                remaining_time = task.remaining_time,
                "task unfinished at horizon"
            );
        }
    }
}

/// Outcomes of a batch with their grand totals.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Per-run outcomes, ordered by run id.
    pub runs: Vec<RunOutcome>,
    /// Sums over all runs.
    pub totals: GrandTotals,
}

impl BatchOutcome {
    fn from_runs(runs: Vec<RunOutcome>) -> Self {
        let totals = GrandTotals::from_runs(runs.iter().map(|r| &r.stats));
        Self { runs, totals }
    }

    /// One record per run, in run order.
    pub fn records(&self) -> Vec<RunRecord> {
        self.runs.iter().map(RunOutcome::record).collect()
    }
}

/// Runs task sets under one configuration and policy.
///
/// Run ids are the positions of the task sets in the batch.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimConfig,
    policy: Arc<dyn SchedulingPolicy>,
}

impl Simulator {
    /// Creates a simulator. Fails fast on an invalid configuration.
    pub fn new(config: SimConfig, policy: Arc<dyn SchedulingPolicy>) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self { config, policy })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Policy in use.
    pub fn policy(&self) -> &dyn SchedulingPolicy {
        self.policy.as_ref()
    }

    /// Prepares a stepwise run.
    pub fn start(&self, run_id: usize, tasks: &[TaskDescriptor]) -> Result<SimulationRun, SimError> {
        SimulationRun::new(run_id, tasks, &self.config, Arc::clone(&self.policy))
    }

    /// Simulates one task set to the end.
    pub fn run(&self, run_id: usize, tasks: &[TaskDescriptor]) -> Result<RunOutcome, SimError> {
        self.start(run_id, tasks)?.finish()
    }

    /// Simulates task sets one after another.
    pub fn run_all(&self, task_sets: &[Vec<TaskDescriptor>]) -> Result<BatchOutcome, SimError> {
        let runs = task_sets
            .iter()
            .enumerate()
            .map(|(run_id, tasks)| self.run(run_id, tasks))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BatchOutcome::from_runs(runs))
    }

    /// Simulates task sets on scoped worker threads.
    ///
    /// Each run owns its state; only the final reduction combines results.
    /// Output is identical to [`Simulator::run_all`].
    pub fn run_all_parallel(
        &self,
        task_sets: &[Vec<TaskDescriptor>],
    ) -> Result<BatchOutcome, SimError> {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(task_sets.len())
            .max(1);
        let chunk_size = task_sets.len().div_ceil(workers).max(1);

        let chunks: Vec<Result<Vec<RunOutcome>, SimError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = task_sets
                .chunks(chunk_size)
                .enumerate()
                .map(|(c, sets)| {
                    scope.spawn(move || {
                        sets.iter()
                            .enumerate()
                            .map(|(i, tasks)| self.run(c * chunk_size + i, tasks))
                            .collect::<Result<Vec<_>, _>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut runs = Vec::with_capacity(task_sets.len());
        for chunk in chunks {
            runs.extend(chunk?);
        }
        Ok(BatchOutcome::from_runs(runs))
    }
}
