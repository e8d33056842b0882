//! # Core allocation for named pre-boot tasks.
//!
//! Each named task requests a relative core weight; its worker allocation is
//! `max(1, floor(weight × max_threads / sum(all weights)))`.
//!
//! The sum of all allocations may over- or under-shoot `max_threads` by
//! rounding drift. This is accepted, documented behavior — the drift is not
//! corrected to sum exactly.

use std::collections::BTreeMap;

use crate::config::TaskEntry;

/// Computes the worker allocation for every named task.
///
/// Returns `(name, allocation)` pairs in map (name) order. A weight of 0 is
/// treated as 1.
pub(crate) fn allocate(tasks: &BTreeMap<String, TaskEntry>, max_threads: usize) -> Vec<(String, usize)> {
    let total: usize = tasks.values().map(|t| t.cores.max(1)).sum();
    if total == 0 {
        return Vec::new();
    }

    tasks
        .iter()
        .map(|(name, entry)| {
            let share = entry.cores.max(1) * max_threads / total;
            (name.clone(), share.max(1))
        })
        .collect()
}
