//! Tick-driven simulation engine and run statistics.
//!
//! Provides the per-run tick loop ([`SimulationRun`]), the batch runner
//! ([`Simulator`]) and the statistics every run produces.
//!
//! # Algorithm
//!
//! Each tick applies, in order: arrivals, expiry of ready tasks with
//! negative laxity, ranking of the ready set by the policy, idle-slot
//! fill, at most one preemption, and execution of every occupied slot.
//! Movements count every change of set membership.
//!
//! # KPI
//!
//! [`RunStats`] tracks preemptions, deadline misses, movements, busy time,
//! worst-case response time, makespan and utilization. [`GrandTotals`] sums
//! them over runs.
//!
//! # References
//!
//! - Buttazzo (2011), "Hard Real-Time Computing Systems", Ch. 3-4
//! - Davis & Burns (2011), "A Survey of Hard Real-Time Scheduling for
//!   Multiprocessor Systems"

mod admission;
mod dispatcher;
mod kpi;
mod simulator;
mod state;
mod trace;

pub use dispatcher::CoreDispatcher;
pub use kpi::{utilization_pct, GrandTotals, MissCause, MissEvent, RunRecord, RunStats};
pub use simulator::{BatchOutcome, RunOutcome, SimulationRun, Simulator};
pub use state::Membership;
pub use trace::{DispatchEvent, PreemptionEvent, SimulationTrace, TickSnapshot};
