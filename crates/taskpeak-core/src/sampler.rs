//! The sampler boundary.
//!
//! The poller does not know how samples are produced. Implementations must
//! return promptly: any latency here delays every live tracker's update.

use crate::error::Result;
use crate::metric::MetricVector;

/// Produces the current executor-wide metric vector.
pub trait MetricSampler: Send + Sync + 'static {
    fn sample(&self) -> Result<MetricVector>;
}

impl<F> MetricSampler for F
where
    F: Fn() -> Result<MetricVector> + Send + Sync + 'static,
{
    fn sample(&self) -> Result<MetricVector> {
        self()
    }
}
