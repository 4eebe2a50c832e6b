use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn timer thread: {0}")]
    TimerSpawn(#[from] std::io::Error),
    #[error("timer '{0}' is still finishing a sampling cycle from before stop()")]
    TimerStillStopping(String),
}
