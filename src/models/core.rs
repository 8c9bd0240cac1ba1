//! Core slot model.
//!
//! A run owns a fixed array of interchangeable execution slots. Each slot
//! holds nothing or the arena index of exactly one running task.

use serde::{Deserialize, Serialize};

use super::Task;

/// Fixed array of execution slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSlots {
    slots: Vec<Option<usize>>,
}

impl CoreSlots {
    /// Creates `count` idle slots.
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Task index held by `slot`, if any.
    pub fn get(&self, slot: usize) -> Option<usize> {
        self.slots.get(slot).copied().flatten()
    }

    /// Whether `slot` exists and is idle.
    pub fn is_idle(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(None))
    }

    /// Places a task in a slot, returning the previous occupant.
    pub fn install(&mut self, slot: usize, task: usize) -> Option<usize> {
        self.slots[slot].replace(task)
    }

    /// Frees a slot, returning the occupant.
    pub fn release(&mut self, slot: usize) -> Option<usize> {
        self.slots[slot].take()
    }

    /// Iterates `(slot, occupant)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        self.slots.iter().copied().enumerate()
    }

    /// Iterates `(slot, task_index)` for occupied slots.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.iter().filter_map(|(slot, task)| task.map(|t| (slot, t)))
    }

    /// Number of occupied slots.
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Occupied slot with the largest key among those `eligible`.
    ///
    /// Folds in slot order and replaces the incumbent only on a strictly
    /// larger key, so the lowest slot index wins ties.
    pub fn max_slot_by<K, F>(&self, tasks: &[Task], eligible: &[bool], key: F) -> Option<usize>
    where
        K: PartialOrd,
        F: Fn(&Task) -> K,
    {
        self.occupied()
            .filter(|&(slot, _)| eligible.get(slot).copied().unwrap_or(false))
            .fold(None, |best: Option<(usize, K)>, (slot, idx)| {
                let k = key(&tasks[idx]);
                let replace = match &best {
                    Some((_, best_key)) => k > *best_key,
                    None => true,
                };
                if replace {
                    Some((slot, k))
                } else {
                    best
                }
            })
            .map(|(slot, _)| slot)
    }
}
