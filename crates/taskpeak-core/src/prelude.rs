//! Convenient re-exports for downstream crates.

pub use crate::config::PollerConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{StageAttemptId, StageId, StageKey, TaskId};
pub use crate::metric::{MetricLayout, MetricVector};
pub use crate::sampler::MetricSampler;
