//! Memory pools with RAII guards, and a sampler that reports their usage.
//!
//! A task acquires a guard before allocating and drops it when done; the
//! `PoolSampler` turns current pool usage into a `MetricVector` for the poller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use taskpeak_core::{MetricLayout, MetricSampler, MetricVector};

use crate::error::{Error, Result};

/// Shared inner state for a pool.
#[derive(Debug)]
struct PoolInner {
    name: String,
    capacity: u64,
    used: AtomicU64,
    peak: AtomicU64,
}

impl PoolInner {
    fn try_acquire(&self, bytes: u64) -> bool {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.record_peak(next);
                return true;
            }
        }
    }

    fn release(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn record_peak(&self, used: u64) {
        let mut cur = self.peak.load(Ordering::Relaxed);
        while used > cur {
            match self
                .peak
                .compare_exchange(cur, used, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }
}

/// A named, capacity-bounded byte pool. Cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl MemoryPool {
    pub fn new(name: impl Into<String>, capacity_bytes: u64) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                capacity: capacity_bytes,
                used: AtomicU64::new(0),
                peak: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.inner.capacity
    }

    /// Current usage (advisory).
    pub fn used_bytes(&self) -> u64 {
        self.inner.used.load(Ordering::Relaxed)
    }

    /// Highest usage ever reached by this pool.
    pub fn peak_bytes(&self) -> u64 {
        self.inner.peak.load(Ordering::Relaxed)
    }

    pub fn try_acquire(&self, bytes: u64) -> Option<PoolGuard> {
        if bytes == 0 || self.inner.try_acquire(bytes) {
            Some(PoolGuard {
                inner: Arc::clone(&self.inner),
                bytes,
            })
        } else {
            None
        }
    }

    pub fn acquire(&self, bytes: u64) -> Result<PoolGuard> {
        self.try_acquire(bytes).ok_or_else(|| Error::PoolExhausted {
            pool: self.inner.name.clone(),
            requested: bytes,
            capacity: self.inner.capacity,
            used: self.used_bytes(),
        })
    }
}

/// Bytes a task holds in one pool; they go back when the guard drops.
#[derive(Debug)]
pub struct PoolGuard {
    inner: Arc<PoolInner>,
    bytes: u64,
}

impl PoolGuard {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Grow or shrink the reservation in place. Growth is all-or-nothing
    /// against the pool's free bytes; shrinking hands the difference back.
    pub fn try_resize(&mut self, new_bytes: u64) -> bool {
        if new_bytes == self.bytes {
            return true;
        }

        if new_bytes < self.bytes {
            self.inner.release(self.bytes - new_bytes);
            self.bytes = new_bytes;
            true
        } else if self.inner.try_acquire(new_bytes - self.bytes) {
            self.bytes = new_bytes;
            true
        } else {
            false
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            self.bytes = 0;
        }
    }
}

/// Samples bound pools into layout slots; unbound slots report zero.
#[derive(Debug, Clone)]
pub struct PoolSampler {
    layout: MetricLayout,
    bindings: Vec<(usize, MemoryPool)>,
}

impl PoolSampler {
    pub fn new(layout: MetricLayout) -> Self {
        Self {
            layout,
            bindings: Vec::new(),
        }
    }

    /// Report `pool`'s usage in the slot named `metric`.
    pub fn bind(mut self, metric: &str, pool: MemoryPool) -> Result<Self> {
        let offset = self
            .layout
            .offset(metric)
            .ok_or_else(|| Error::UnknownMetric(metric.to_string()))?;
        self.bindings.retain(|(o, _)| *o != offset);
        self.bindings.push((offset, pool));
        Ok(self)
    }

    pub fn layout(&self) -> &MetricLayout {
        &self.layout
    }
}

impl MetricSampler for PoolSampler {
    fn sample(&self) -> taskpeak_core::Result<MetricVector> {
        let mut values = vec![0i64; self.layout.len()];
        for (offset, pool) in &self.bindings {
            values[*offset] = i64::try_from(pool.used_bytes()).unwrap_or(i64::MAX);
        }
        Ok(values.into())
    }
}
