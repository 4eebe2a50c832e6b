use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("duplicate metric name in layout: {0}")]
    DuplicateMetric(String),

    #[error("sample has {actual} metrics, layout expects {expected}")]
    SampleLength { expected: usize, actual: usize },

    // Samplers backed by OS or allocator probes map their failures here.
    #[error("sampler failed: {0}")]
    Sample(String),
}
