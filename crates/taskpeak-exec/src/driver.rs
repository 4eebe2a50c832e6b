//! One sampling cycle: read the sampler, fold the result into every live
//! task and stage tracker.
//!
//! The same sample goes to every tracker present at the time of the scan. A
//! spike is therefore a peak candidate for every task running when it was
//! observed, not only the task that caused it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use taskpeak_core::{MetricLayout, MetricSampler, Result};
use taskpeak_mem::{StageRegistry, TaskRegistry};

pub struct PollDriver {
    layout: Arc<MetricLayout>,
    sampler: Box<dyn MetricSampler>,
    tasks: Arc<TaskRegistry>,
    stages: Arc<StageRegistry>,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl PollDriver {
    pub fn new(
        layout: Arc<MetricLayout>,
        sampler: Box<dyn MetricSampler>,
        tasks: Arc<TaskRegistry>,
        stages: Arc<StageRegistry>,
    ) -> Self {
        Self {
            layout,
            sampler,
            tasks,
            stages,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Run one cycle. Errors and panics from the sampler are logged and
    /// swallowed so a bad cycle never stops the ones after it. Returns
    /// whether the sample was applied.
    pub fn sample(&self) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| self.poll_once())) {
            Ok(Ok(())) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "unable to poll executor metrics");
                false
            }
            Err(payload) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(panic = panic_message(&*payload), "executor metrics sampler panicked");
                false
            }
        }
    }

    fn poll_once(&self) -> Result<()> {
        let latest = self.sampler.sample()?;
        self.layout.check(&latest)?;
        self.tasks.for_each_tracker(|t| t.update(&latest));
        self.stages.for_each_tracker(|t| t.update(&latest));
        Ok(())
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed_cycles(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use taskpeak_core::{Error, MetricVector, StageKey, TaskId};

    fn driver_with<S: MetricSampler>(sampler: S) -> (PollDriver, Arc<TaskRegistry>, Arc<StageRegistry>) {
        let layout = Arc::new(MetricLayout::new(["a", "b"]).unwrap());
        let tasks = Arc::new(TaskRegistry::new(2));
        let stages = Arc::new(StageRegistry::new(2));
        let driver = PollDriver::new(layout, Box::new(sampler), Arc::clone(&tasks), Arc::clone(&stages));
        (driver, tasks, stages)
    }

    #[test]
    fn sample_updates_tasks_and_stages() {
        let (driver, tasks, stages) = driver_with(|| -> Result<MetricVector> { Ok(MetricVector::from([3, 4])) });
        tasks.start(TaskId::new(1));
        stages.increment_for_task(StageKey::new(0, 0));
        assert!(driver.sample());
        assert_eq!(tasks.read_peaks(TaskId::new(1)).as_slice(), &[3, 4]);
        assert_eq!(stages.peaks(StageKey::new(0, 0)).unwrap().as_slice(), &[3, 4]);
        assert_eq!(driver.completed_cycles(), 1);
    }

    #[test]
    fn wrong_length_sample_is_dropped() {
        let (driver, tasks, _) = driver_with(|| -> Result<MetricVector> { Ok(MetricVector::from([9, 9, 9])) });
        tasks.start(TaskId::new(1));
        assert!(!driver.sample());
        assert_eq!(tasks.read_peaks(TaskId::new(1)), MetricVector::zeros(2));
        assert_eq!(driver.failed_cycles(), 1);
    }

    #[test]
    fn failures_do_not_poison_later_cycles() {
        let fail_next = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&fail_next);
        let (driver, tasks, _) = driver_with(move || -> Result<MetricVector> {
            if flag.swap(false, Ordering::SeqCst) {
                Err(Error::Sample("probe unavailable".into()))
            } else {
                Ok(MetricVector::from([1, 1]))
            }
        });
        tasks.start(TaskId::new(5));
        assert!(!driver.sample());
        assert!(driver.sample());
        assert_eq!(tasks.read_peaks(TaskId::new(5)).as_slice(), &[1, 1]);
    }

    #[test]
    fn sampler_panic_is_caught() {
        let (driver, _, _) = driver_with(|| -> Result<MetricVector> { panic!("boom") });
        assert!(!driver.sample());
        assert_eq!(driver.failed_cycles(), 1);
    }
}
