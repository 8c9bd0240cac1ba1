//! Simulation domain models.
//!
//! Provides the data types a run is built from: task descriptors and their
//! run-local working copies, the fixed array of core slots, and the
//! three-phase operating environment.
//!
//! # Lifecycle
//!
//! ```text
//! NotArrived ──arrival──► Ready ──assign──► Running(slot) ──finish──► Completed
//!                           │  ◄──preempt──┘
//!                           └──laxity < 0──► Dropped
//! ```

mod core;
mod environment;
mod task;

pub use self::core::CoreSlots;
pub use environment::{EnvironmentCondition, EnvironmentProfile};
pub use task::{Task, TaskDescriptor, TaskId, TaskState};
