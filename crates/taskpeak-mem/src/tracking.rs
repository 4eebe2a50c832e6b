//! Per-entity peak tracking.
//!
//! One `AtomicI64` per metric slot. Folding a sample is a CAS max loop per slot,
//! so concurrent readers and resetters never wait on a lock.

use std::sync::atomic::{AtomicI64, Ordering};

use taskpeak_core::MetricVector;

pub struct PeakTracker {
    slots: Box<[AtomicI64]>,
}

impl PeakTracker {
    /// Fresh tracker with `len` zeroed slots. Metrics are assumed non-negative.
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| AtomicI64::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fold `latest` in: every slot becomes `max(slot, latest[i])`.
    pub fn update(&self, latest: &MetricVector) {
        debug_assert_eq!(latest.len(), self.slots.len());
        for (slot, &value) in self.slots.iter().zip(latest.as_slice()) {
            let mut cur = slot.load(Ordering::Relaxed);
            while value > cur {
                match slot.compare_exchange(cur, value, Ordering::AcqRel, Ordering::Relaxed) {
                    Ok(_) => break,
                    Err(observed) => cur = observed,
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(slots = self.slots.len(), "folded sample into tracker");
    }

    /// Current peaks. Slots are read independently.
    pub fn read(&self) -> MetricVector {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .collect::<Vec<_>>()
            .into()
    }

    /// Zero every slot and return what was there.
    ///
    /// Each slot is swapped on its own. A concurrent `update` lands either in
    /// the returned values or in the fresh epoch, never both.
    pub fn snapshot_and_reset(&self) -> MetricVector {
        self.slots
            .iter()
            .map(|slot| slot.swap(0, Ordering::AcqRel))
            .collect::<Vec<_>>()
            .into()
    }
}

impl std::fmt::Debug for PeakTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeakTracker")
            .field("peaks", &self.read())
            .finish()
    }
}
