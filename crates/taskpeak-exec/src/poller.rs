//! Executor metrics poller: per-task and per-stage-attempt peak tracking.
//!
//! Worker threads call `on_task_start` / `on_task_completion` around each
//! task. Samples come either from the internal fixed-rate timer (positive
//! `poll_interval_ms`) or from the owner calling `poll()` on its heartbeat.
//! The heartbeat reporter calls `get_and_reset_stage_peaks` once per interval
//! to collect "peaks since the last report".

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use taskpeak_core::{MetricLayout, MetricSampler, MetricVector, PollerConfig, StageKey, TaskId};
use taskpeak_mem::{StageRegistry, TaskRegistry};

use crate::driver::PollDriver;
use crate::error::ExecError;
use crate::metrics;
use crate::timer::FixedRateTimer;

pub struct MetricsPoller {
    config: PollerConfig,
    layout: Arc<MetricLayout>,
    tasks: Arc<TaskRegistry>,
    stages: Arc<StageRegistry>,
    driver: Arc<PollDriver>,
    // Only touched by start/stop, never on the task hot path.
    timer: Mutex<Option<FixedRateTimer>>,
}

impl MetricsPoller {
    pub fn new<S: MetricSampler>(sampler: S, layout: MetricLayout, config: PollerConfig) -> Self {
        let layout = Arc::new(layout);
        let tasks = Arc::new(TaskRegistry::new(layout.len()));
        let stages = Arc::new(StageRegistry::new(layout.len()));
        let driver = Arc::new(PollDriver::new(
            Arc::clone(&layout),
            Box::new(sampler),
            Arc::clone(&tasks),
            Arc::clone(&stages),
        ));
        Self {
            config,
            layout,
            tasks,
            stages,
            driver,
            timer: Mutex::new(None),
        }
    }

    pub fn layout(&self) -> &MetricLayout {
        &self.layout
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Start the internal timer. No-op when polling is heartbeat-driven or
    /// the timer is already running. If a previous `stop` timed out, waits
    /// once more for that thread and fails if it is still sampling, so two
    /// timers never sample at the same time.
    pub fn start(&self) -> Result<(), ExecError> {
        let Some(period) = self.config.poll_interval() else {
            tracing::debug!("poll interval not positive; expecting heartbeat-driven polling");
            return Ok(());
        };
        let mut slot = self.timer_slot();
        if let Some(timer) = slot.as_mut() {
            if !timer.is_stopping() {
                return Ok(());
            }
            if !timer.stop(self.config.shutdown_timeout()) {
                return Err(ExecError::TimerStillStopping(self.config.thread_name.clone()));
            }
        }
        let driver = Arc::clone(&self.driver);
        *slot = Some(FixedRateTimer::spawn(&self.config.thread_name, period, move || {
            driver.sample();
        })?);
        Ok(())
    }

    /// Stop the internal timer, waiting up to the configured shutdown timeout
    /// for an in-flight cycle. Returns `false` only if that wait ran out; the
    /// timer then stays registered until a later `stop` or `start` sees it exit.
    pub fn stop(&self) -> bool {
        let mut slot = self.timer_slot();
        let Some(timer) = slot.as_mut() else {
            return true;
        };
        let stopped = timer.stop(self.config.shutdown_timeout());
        if stopped {
            *slot = None;
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.timer_slot().as_ref().is_some_and(FixedRateTimer::is_running)
    }

    /// Run one sampling cycle now. Used by heartbeat-driven owners.
    pub fn poll(&self) -> bool {
        self.driver.sample()
    }

    /// Must precede any other call that names `task`.
    pub fn on_task_start(&self, task: TaskId, stage: StageKey) {
        self.tasks.start(task);
        let running = self.stages.increment_for_task(stage);
        tracing::trace!(task = task.get(), %stage, running, "task started");
    }

    /// Only valid after a matching `on_task_start`; unpaired calls are not
    /// checked.
    pub fn on_task_completion(&self, task: TaskId, stage: StageKey) {
        let running = self.stages.decrement_for_task(stage);
        self.tasks.complete(task);
        tracing::trace!(task = task.get(), %stage, ?running, "task completed");
    }

    /// Peaks seen while `task` was running; zeros for unknown ids.
    pub fn get_task_metric_peaks(&self, task: TaskId) -> MetricVector {
        self.tasks.read_peaks(task)
    }

    /// Peaks for every active stage attempt since the previous call, after
    /// which each stage's tracker starts again from zero.
    pub fn get_and_reset_stage_peaks(&self) -> HashMap<StageKey, MetricVector> {
        let peaks = self.stages.snapshot_and_reset_all();
        metrics::emit_stage_peaks(&self.layout, &peaks);
        peaks
    }

    pub fn running_tasks(&self, stage: StageKey) -> Option<u64> {
        self.stages.running_tasks(stage)
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn active_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn driver(&self) -> &PollDriver {
        &self.driver
    }

    fn timer_slot(&self) -> MutexGuard<'_, Option<FixedRateTimer>> {
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for MetricsPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
