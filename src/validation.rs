//! Input validation for simulation runs.
//!
//! Two levels:
//! - Configuration problems are fatal and reported as [`SimError::InvalidConfig`]
//!   before any run starts.
//! - Malformed task descriptors are not fatal. They are collected as
//!   [`ValidationError`]s and the offending descriptors are rejected at
//!   admission, where they count as deadline misses.

use std::collections::HashSet;

use crate::config::SimConfig;
use crate::models::TaskDescriptor;
use crate::SimError;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of descriptor errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two descriptors in one task set share an ID.
    DuplicateId,
    /// Arrival time is before tick 0.
    NegativeArrival,
    /// Burst time is negative.
    NegativeBurst,
    /// Deadline is at or before the arrival time.
    DeadlineNotAfterArrival,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Descriptors split by validity, each list in input order.
#[derive(Debug, Clone, Default)]
pub struct PartitionedTaskSet {
    /// Descriptors admitted to the run.
    pub accepted: Vec<TaskDescriptor>,
    /// Descriptors rejected, with the first problem found for each.
    pub rejected: Vec<(TaskDescriptor, ValidationError)>,
}

/// Checks a single descriptor in isolation.
pub fn check_descriptor(desc: &TaskDescriptor) -> Option<ValidationError> {
    if desc.arrival_time < 0 {
        return Some(ValidationError::new(
            ValidationErrorKind::NegativeArrival,
            format!("Task {} arrives at negative tick {}", desc.id, desc.arrival_time),
        ));
    }
    if desc.burst_time < 0 {
        return Some(ValidationError::new(
            ValidationErrorKind::NegativeBurst,
            format!("Task {} has negative burst time {}", desc.id, desc.burst_time),
        ));
    }
    if desc.deadline <= desc.arrival_time {
        return Some(ValidationError::new(
            ValidationErrorKind::DeadlineNotAfterArrival,
            format!(
                "Task {} deadline {} is not after arrival {}",
                desc.id, desc.deadline, desc.arrival_time
            ),
        ));
    }
    None
}

/// Validates a task set.
///
/// Checks:
/// 1. No duplicate task IDs
/// 2. No negative arrival times
/// 3. No negative burst times
/// 4. Every deadline is after its arrival
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_task_set(tasks: &[TaskDescriptor]) -> ValidationResult {
    let partition = partition_task_set(tasks);
    if partition.rejected.is_empty() {
        Ok(())
    } else {
        Err(partition.rejected.into_iter().map(|(_, e)| e).collect())
    }
}

/// Splits a task set into accepted and rejected descriptors.
///
/// The first occurrence of an ID wins; later duplicates are rejected.
pub fn partition_task_set(tasks: &[TaskDescriptor]) -> PartitionedTaskSet {
    let mut seen = HashSet::new();
    let mut partition = PartitionedTaskSet::default();

    for desc in tasks {
        let error = if seen.contains(&desc.id) {
            Some(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task ID: {}", desc.id),
            ))
        } else {
            check_descriptor(desc)
        };

        match error {
            Some(e) => partition.rejected.push((*desc, e)),
            None => {
                seen.insert(desc.id);
                partition.accepted.push(*desc);
            }
        }
    }

    partition
}

/// Validates run parameters.
pub fn validate_config(config: &SimConfig) -> Result<(), SimError> {
    if config.core_count == 0 {
        return Err(SimError::InvalidConfig(
            "core_count must be positive".to_string(),
        ));
    }
    if config.horizon <= 0 {
        return Err(SimError::InvalidConfig(format!(
            "horizon must be positive, got {}",
            config.horizon
        )));
    }
    if config.context_switch < 0 {
        return Err(SimError::InvalidConfig(format!(
            "context_switch must be non-negative, got {}",
            config.context_switch
        )));
    }

    let relax = &config.relaxation;
    check_weight("relaxation.alpha", relax.alpha)?;
    check_weight("relaxation.beta", relax.beta)?;
    check_epsilon("relaxation.epsilon", relax.epsilon)?;

    let env = &config.environment;
    check_weight("environment.alpha", env.alpha)?;
    check_weight("environment.beta", env.beta)?;
    check_epsilon("environment.epsilon", env.epsilon)?;
    check_weight("environment.default_multiplier", env.default_multiplier)?;
    for (condition, &m) in &env.multipliers {
        check_weight(&format!("environment.multipliers[{condition:?}]"), m)?;
    }

    Ok(())
}

fn check_weight(name: &str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::InvalidConfig(format!(
            "{name} must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

fn check_epsilon(name: &str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SimError::InvalidConfig(format!(
            "{name} must be finite and positive, got {value}"
        )));
    }
    Ok(())
}
