#![forbid(unsafe_code)]
//! taskpeak-mem: atomic peak trackers, the task/stage registries, and memory
//! pools that can be sampled as executor metrics.
//!
//! Every operation here is on the task start/stop hot path or on the sampling
//! path, so nothing takes a lock wider than one map shard.

pub mod error;
pub mod pool;
pub mod registry;
pub mod tracking;

pub use error::{Error, Result};
pub use pool::{MemoryPool, PoolGuard, PoolSampler};
pub use registry::{StageRegistry, TaskRegistry};
pub use tracking::PeakTracker;
