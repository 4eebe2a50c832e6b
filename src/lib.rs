#![forbid(unsafe_code)]
//! taskpeak: executor-side peak tracking of resource metrics per running task
//! and per active stage attempt.
//!
//! This facade re-exports the workspace crates:
//! - [`types`]: ids, metric vectors and layout, config, the sampler trait
//! - [`mem`]: peak trackers, task/stage registries, memory pools
//! - [`exec`]: poll driver, fixed-rate timer, and [`MetricsPoller`]

pub use taskpeak_core as types;
pub use taskpeak_exec as exec;
pub use taskpeak_mem as mem;

pub use taskpeak_core::{
    MetricLayout, MetricSampler, MetricVector, PollerConfig, StageKey, TaskId,
};
pub use taskpeak_exec::MetricsPoller;
