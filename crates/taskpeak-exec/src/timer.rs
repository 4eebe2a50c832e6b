//! Dedicated-thread fixed-rate timer.
//!
//! Ticks are scheduled at `start + n * period`. A tick that overruns makes the
//! following ones fire back to back until the schedule is caught up; ticks
//! never overlap since they all run on the one thread.

use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ExecError;

pub struct FixedRateTimer {
    name: String,
    shutdown: Option<mpsc::Sender<()>>,
    exited: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl FixedRateTimer {
    /// Spawn a thread that calls `tick` immediately and then every `period`.
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> Result<Self, ExecError>
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        // Never sent on; the receiver sees a disconnect once the thread is done.
        let (exited_tx, exited_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _exited = exited_tx;
                let mut next = Instant::now();
                loop {
                    let now = Instant::now();
                    let stop = if next > now {
                        !matches!(
                            shutdown_rx.recv_timeout(next - now),
                            Err(RecvTimeoutError::Timeout)
                        )
                    } else {
                        !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
                    };
                    if stop {
                        break;
                    }
                    tick();
                    next += period;
                }
            })?;

        tracing::debug!(timer = name, period_ms = period.as_millis() as u64, "started fixed-rate timer");
        Ok(Self {
            name: name.to_string(),
            shutdown: Some(shutdown_tx),
            exited: exited_rx,
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop and wait up to `timeout` for an in-flight tick.
    /// Returns `false` if the thread was still busy when the wait ran out. The
    /// handle is kept in that case, so `is_running` stays true and a later
    /// `stop` can wait again.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        drop(self.shutdown.take());
        if self.handle.is_none() {
            return true;
        }
        if let Err(RecvTimeoutError::Timeout) = self.exited.recv_timeout(timeout) {
            tracing::warn!(
                timer = %self.name,
                timeout_ms = timeout.as_millis() as u64,
                "timer thread did not stop in time"
            );
            return false;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(timer = %self.name, "timer thread panicked");
            }
        }
        tracing::debug!(timer = %self.name, "stopped fixed-rate timer");
        true
    }

    /// True while the thread is alive, including after a timed-out `stop`.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// True once `stop` has been requested.
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_none()
    }
}

impl Drop for FixedRateTimer {
    fn drop(&mut self) {
        // Signal only; blocking waits belong in `stop`.
        drop(self.shutdown.take());
    }
}
