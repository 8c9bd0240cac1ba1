//! Multi-core real-time scheduling simulator for the U-Engine ecosystem.
//!
//! Simulates preemptive dispatch of real-time tasks onto a fixed set of
//! core slots in discrete ticks, and reports deadline compliance,
//! preemption cost and worst-case response time.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `TaskDescriptor`, `Task`, `CoreSlots`,
//!   `EnvironmentCondition`, `EnvironmentProfile`
//! - **`dispatching`**: Rules, the rule engine and the five scheduling
//!   policies (EDF, MLLF, weighted relaxation, environment-adaptive
//!   relaxation, predictor-guided)
//! - **`scheduler`**: Tick loop, core dispatcher, statistics and traces
//! - **`config`**: Run parameters
//! - **`validation`**: Configuration and task descriptor checks
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use u_rtsim::config::SimConfig;
//! use u_rtsim::dispatching::policies::EdfPolicy;
//! use u_rtsim::models::TaskDescriptor;
//! use u_rtsim::scheduler::Simulator;
//!
//! let sim = Simulator::new(SimConfig::new(2, 20), Arc::new(EdfPolicy::new())).unwrap();
//! let sets = vec![vec![
//!     TaskDescriptor::new(1, 0, 3, 10, 1),
//!     TaskDescriptor::new(2, 1, 2, 6, 2),
//! ]];
//! let batch = sim.run_all(&sets).unwrap();
//! assert_eq!(batch.totals.deadline_misses, 0);
//! ```
//!
//! # References
//!
//! - Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in a
//!   Hard-Real-Time Environment"
//! - Buttazzo (2011), "Hard Real-Time Computing Systems"

pub mod config;
pub mod dispatching;
mod error;
pub mod models;
pub mod scheduler;
pub mod validation;

pub use error::SimError;
