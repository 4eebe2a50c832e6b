//! Concurrent task and stage registries.
//!
//! Both are `DashMap`s: per-key operations take one shard lock, and there is
//! no lock spanning the whole map. Iteration visits whatever is present shard
//! by shard; entries inserted or removed while a scan is running may or may
//! not be seen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use taskpeak_core::{MetricVector, StageKey, TaskId};

use crate::tracking::PeakTracker;

/// One tracker per running task.
#[derive(Debug)]
pub struct TaskRegistry {
    metrics: usize,
    entries: DashMap<TaskId, PeakTracker>,
}

impl TaskRegistry {
    pub fn new(metrics: usize) -> Self {
        Self {
            metrics,
            entries: DashMap::new(),
        }
    }

    /// Register `task` with a zeroed tracker, replacing any existing entry.
    pub fn start(&self, task: TaskId) {
        self.entries.insert(task, PeakTracker::new(self.metrics));
    }

    /// Drop the task's tracker. Absent ids are ignored.
    pub fn complete(&self, task: TaskId) {
        self.entries.remove(&task);
    }

    /// Peaks for `task`, or all zeros if it is not registered.
    pub fn read_peaks(&self, task: TaskId) -> MetricVector {
        match self.entries.get(&task) {
            Some(tracker) => tracker.read(),
            None => MetricVector::zeros(self.metrics),
        }
    }

    pub fn for_each_tracker<F: FnMut(&PeakTracker)>(&self, mut f: F) {
        for entry in self.entries.iter() {
            f(entry.value());
        }
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.entries.contains_key(&task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct StageEntry {
    running: AtomicU64,
    peaks: PeakTracker,
}

/// Running-task count and peaks per active stage attempt.
#[derive(Debug)]
pub struct StageRegistry {
    metrics: usize,
    entries: DashMap<StageKey, StageEntry>,
}

impl StageRegistry {
    pub fn new(metrics: usize) -> Self {
        Self {
            metrics,
            entries: DashMap::new(),
        }
    }

    /// Create the entry if needed and bump its running count. Returns the new
    /// count (diagnostic only).
    pub fn increment_for_task(&self, key: StageKey) -> u64 {
        let entry = self.entries.entry(key).or_insert_with(|| StageEntry {
            running: AtomicU64::new(0),
            peaks: PeakTracker::new(self.metrics),
        });
        entry.running.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop the running count by one and remove the entry, peaks included,
    /// once it reaches zero. Returns the new count, or `None` if the key was
    /// not registered.
    pub fn decrement_for_task(&self, key: StageKey) -> Option<u64> {
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => {
                let prev = occupied.get().running.fetch_sub(1, Ordering::AcqRel);
                let left = prev.saturating_sub(1);
                if left == 0 {
                    occupied.remove();
                }
                Some(left)
            }
            Entry::Vacant(_) => None,
        }
    }

    pub fn for_each_tracker<F: FnMut(&PeakTracker)>(&self, mut f: F) {
        for entry in self.entries.iter() {
            f(&entry.value().peaks);
        }
    }

    /// Capture every stage's peaks and zero its tracker. Running counts are
    /// kept. Not atomic across keys: a sample folded while this runs may be
    /// counted in this epoch for one stage and the next epoch for another.
    pub fn snapshot_and_reset_all(&self) -> HashMap<StageKey, MetricVector> {
        let mut out = HashMap::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            out.insert(*entry.key(), entry.value().peaks.snapshot_and_reset());
        }
        out
    }

    /// Current peaks for one stage, if registered.
    pub fn peaks(&self, key: StageKey) -> Option<MetricVector> {
        self.entries.get(&key).map(|e| e.peaks.read())
    }

    pub fn running_tasks(&self, key: StageKey) -> Option<u64> {
        self.entries
            .get(&key)
            .map(|e| e.running.load(Ordering::Acquire))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_registry_start_complete_read() {
        let tasks = TaskRegistry::new(3);
        let t = TaskId::new(1);
        tasks.start(t);
        assert!(tasks.contains(t));
        tasks.for_each_tracker(|tr| tr.update(&MetricVector::from([1, 2, 3])));
        assert_eq!(tasks.read_peaks(t).as_slice(), &[1, 2, 3]);
        tasks.complete(t);
        assert!(tasks.is_empty());
        assert_eq!(tasks.read_peaks(t), MetricVector::zeros(3));
        // completing twice is fine
        tasks.complete(t);
    }

    #[test]
    fn restarting_a_task_id_starts_from_zero() {
        let tasks = TaskRegistry::new(1);
        let t = TaskId::new(9);
        tasks.start(t);
        tasks.for_each_tracker(|tr| tr.update(&MetricVector::from([5])));
        tasks.complete(t);
        tasks.start(t);
        assert_eq!(tasks.read_peaks(t).as_slice(), &[0]);
    }

    #[test]
    fn stage_entry_lives_while_tasks_run() {
        let stages = StageRegistry::new(2);
        let key = StageKey::new(1, 0);
        assert_eq!(stages.increment_for_task(key), 1);
        assert_eq!(stages.increment_for_task(key), 2);
        assert_eq!(stages.decrement_for_task(key), Some(1));
        assert_eq!(stages.running_tasks(key), Some(1));
        assert_eq!(stages.decrement_for_task(key), Some(0));
        assert!(stages.is_empty());
        assert_eq!(stages.decrement_for_task(key), None);
    }

    #[test]
    fn drain_keeps_counts_and_zeroes_peaks() {
        let stages = StageRegistry::new(2);
        let a = StageKey::new(1, 0);
        let b = StageKey::new(2, 0);
        stages.increment_for_task(a);
        stages.increment_for_task(b);
        stages.for_each_tracker(|tr| tr.update(&MetricVector::from([4, 6])));

        let drained = stages.snapshot_and_reset_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[&a].as_slice(), &[4, 6]);
        assert_eq!(stages.peaks(a), Some(MetricVector::zeros(2)));
        assert_eq!(stages.running_tasks(b), Some(1));
    }
}
