//! Metric vectors and the name-to-offset layout that gives them meaning.
//!
//! A `MetricVector` is opaque to the tracking code apart from element-wise max.
//! Its length `M` is fixed by the `MetricLayout` the poller is built with and
//! never changes for the lifetime of the process.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Standard executor layout, in offset order.
pub const EXECUTOR_METRICS: &[&str] = &[
    "jvm_heap_memory",
    "jvm_off_heap_memory",
    "on_heap_execution_memory",
    "off_heap_execution_memory",
    "on_heap_storage_memory",
    "off_heap_storage_memory",
    "on_heap_unified_memory",
    "off_heap_unified_memory",
    "direct_pool_memory",
    "mapped_pool_memory",
    "process_tree_rss",
];

/// Fixed-length sample of executor-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricVector(Vec<i64>);

impl MetricVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<i64> {
        self.0.get(idx).copied()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Element-wise max with `other`, in place. Extra slots on either side are
    /// left untouched.
    pub fn merge_max(&mut self, other: &MetricVector) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }
    }
}

impl From<Vec<i64>> for MetricVector {
    fn from(v: Vec<i64>) -> Self {
        Self(v)
    }
}

impl<const N: usize> From<[i64; N]> for MetricVector {
    fn from(v: [i64; N]) -> Self {
        Self(v.to_vec())
    }
}

/// Stable mapping from metric name to offset in every `MetricVector`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct MetricLayout {
    names: Vec<String>,
    offsets: HashMap<String, usize>,
}

impl MetricLayout {
    /// Build a layout from names in offset order.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::Config("metric layout must name at least one metric".into()));
        }
        let mut offsets = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if offsets.insert(name.clone(), idx).is_some() {
                return Err(Error::DuplicateMetric(name.clone()));
            }
        }
        Ok(Self { names, offsets })
    }

    pub fn executor_default() -> Self {
        let names: Vec<String> = EXECUTOR_METRICS.iter().map(|s| s.to_string()).collect();
        let offsets = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Self { names, offsets }
    }

    /// Number of metrics (`M`).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Reject samples that do not have exactly `M` slots.
    pub fn check(&self, sample: &MetricVector) -> Result<()> {
        if sample.len() != self.len() {
            return Err(Error::SampleLength {
                expected: self.len(),
                actual: sample.len(),
            });
        }
        Ok(())
    }

    /// Label a vector's slots with their metric names.
    pub fn named(&self, values: &MetricVector) -> BTreeMap<String, i64> {
        self.names
            .iter()
            .zip(values.as_slice())
            .map(|(name, v)| (name.clone(), *v))
            .collect()
    }
}

impl TryFrom<Vec<String>> for MetricLayout {
    type Error = Error;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<MetricLayout> for Vec<String> {
    fn from(layout: MetricLayout) -> Self {
        layout.names
    }
}
