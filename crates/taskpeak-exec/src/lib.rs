#![forbid(unsafe_code)]
//! taskpeak-exec: the poll driver, its fixed-rate timer, and the executor
//! metrics poller that ties the registries to task lifecycle hooks.

pub mod driver;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod timer;

pub use driver::PollDriver;
pub use error::ExecError;
pub use poller::MetricsPoller;
pub use timer::FixedRateTimer;
