use thiserror::Error;

/// Result type local to taskpeak-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("memory pool '{pool}' exhausted: requested {requested} bytes, capacity {capacity}, used {used}")]
    PoolExhausted {
        pool: String,
        requested: u64,
        capacity: u64,
        used: u64,
    },

    #[error("metric '{0}' is not part of the layout")]
    UnknownMetric(String),
}
