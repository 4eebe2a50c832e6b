#![forbid(unsafe_code)]
//! taskpeak-core: ids, metric vectors, layout, config, and the sampler seam.
//!
//! Everything that the tracker, registries, and poller share lives here so the
//! other crates agree on one definition of "a sample". No threads or IO.

pub mod config;
pub mod error;
pub mod id;
pub mod metric;
pub mod prelude;
pub mod sampler;

pub use config::PollerConfig;
pub use error::{Error, Result};
pub use id::{StageAttemptId, StageId, StageKey, TaskId};
pub use metric::{MetricLayout, MetricVector};
pub use sampler::MetricSampler;
