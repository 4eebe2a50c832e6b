//! taskpeak CLI: drive the metrics poller with a synthetic executor workload.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use taskpeak_core::prelude::*;
use taskpeak_exec::MetricsPoller;
use taskpeak_mem::{MemoryPool, PoolSampler};

#[derive(Parser)]
#[command(name = "taskpeak")]
#[command(about = "Per-task and per-stage metric peak tracking for executors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic workload and report stage peaks on every heartbeat
    Simulate {
        /// Number of stages to run
        #[arg(long, default_value_t = 3)]
        stages: u64,

        /// Tasks submitted per stage
        #[arg(long, default_value_t = 8)]
        tasks_per_stage: u64,

        /// Concurrent worker threads
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// How long each task holds its memory
        #[arg(long, default_value_t = 50)]
        task_ms: u64,

        /// Base execution memory per task in bytes
        #[arg(long, default_value_t = 1 << 20)]
        task_bytes: u64,

        /// Capacity of each memory pool in bytes
        #[arg(long, default_value_t = 64 << 20)]
        pool_capacity: u64,

        /// Sampling period in ms; <= 0 polls on the heartbeat (overrides env)
        #[arg(long, allow_hyphen_values = true)]
        poll_interval_ms: Option<i64>,

        /// Heartbeat (report) interval in ms
        #[arg(long, default_value_t = 100)]
        heartbeat_ms: u64,

        /// Emit JSON lines instead of human-readable reports
        #[arg(long)]
        json: bool,
    },
    /// Print the default executor metric layout
    Layout {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy)]
struct Job {
    task: TaskId,
    stage: StageKey,
    bytes: u64,
}

#[derive(Serialize)]
struct StageReport {
    heartbeat: u64,
    stage: String,
    peaks: BTreeMap<String, i64>,
}

struct SimulateArgs {
    stages: u64,
    tasks_per_stage: u64,
    workers: usize,
    task_ms: u64,
    task_bytes: u64,
    pool_capacity: u64,
    heartbeat_ms: u64,
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            stages,
            tasks_per_stage,
            workers,
            task_ms,
            task_bytes,
            pool_capacity,
            poll_interval_ms,
            heartbeat_ms,
            json,
        } => {
            let mut config = PollerConfig::from_env();
            apply_overrides(&mut config, poll_interval_ms);
            let args = SimulateArgs {
                stages,
                tasks_per_stage,
                workers,
                task_ms,
                task_bytes,
                pool_capacity,
                heartbeat_ms,
                json,
            };
            simulate(config, args)
        }
        Commands::Layout { json } => {
            let layout = MetricLayout::executor_default();
            if json {
                println!("{}", serde_json::to_string_pretty(&layout)?);
            } else {
                for (idx, name) in layout.names().iter().enumerate() {
                    println!("{idx:>3}  {name}");
                }
            }
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut PollerConfig, poll_interval_ms: Option<i64>) {
    if let Some(ms) = poll_interval_ms {
        config.poll_interval_ms = ms;
    }
}

/// Upper bound on synthetic tasks per run.
const MAX_JOBS: u64 = 10_000_000;

fn build_jobs(stages: u64, tasks_per_stage: u64, task_bytes: u64) -> Result<Vec<Job>> {
    let total = stages
        .checked_mul(tasks_per_stage)
        .filter(|n| *n <= MAX_JOBS)
        .with_context(|| {
            format!("{stages} stages x {tasks_per_stage} tasks exceeds the {MAX_JOBS} task limit")
        })?;
    let mut jobs = Vec::with_capacity(total as usize);
    let mut next_task = 0u64;
    for stage in 0..stages {
        for i in 0..tasks_per_stage {
            jobs.push(Job {
                task: TaskId::new(next_task),
                stage: StageKey::new(stage, 0),
                bytes: task_bytes.saturating_mul(1 + i % 3),
            });
            next_task += 1;
        }
    }
    Ok(jobs)
}

fn simulate(config: PollerConfig, args: SimulateArgs) -> Result<()> {
    let layout = MetricLayout::executor_default();
    let on_heap_exec = MemoryPool::new("on_heap_execution", args.pool_capacity);
    let off_heap_exec = MemoryPool::new("off_heap_execution", args.pool_capacity);
    let on_heap_storage = MemoryPool::new("on_heap_storage", args.pool_capacity);
    let sampler = PoolSampler::new(layout.clone())
        .bind("on_heap_execution_memory", on_heap_exec.clone())?
        .bind("off_heap_execution_memory", off_heap_exec.clone())?
        .bind("on_heap_storage_memory", on_heap_storage.clone())?;

    let heartbeat_polls = config.poll_interval().is_none();
    let poller = Arc::new(MetricsPoller::new(sampler, layout, config));
    poller.start().context("starting metrics poller")?;

    let jobs = Arc::new(build_jobs(args.stages, args.tasks_per_stage, args.task_bytes)?);
    let cursor = Arc::new(AtomicUsize::new(0));
    let task_time = Duration::from_millis(args.task_ms);

    let workers: Vec<_> = (0..args.workers.max(1))
        .map(|w| {
            let poller = Arc::clone(&poller);
            let jobs = Arc::clone(&jobs);
            let cursor = Arc::clone(&cursor);
            let on_heap_exec = on_heap_exec.clone();
            let off_heap_exec = off_heap_exec.clone();
            let on_heap_storage = on_heap_storage.clone();
            thread::Builder::new()
                .name(format!("worker-{w}"))
                .spawn(move || loop {
                    let Some(job) = jobs.get(cursor.fetch_add(1, Ordering::Relaxed)).copied()
                    else {
                        break;
                    };
                    poller.on_task_start(job.task, job.stage);
                    {
                        let exec = on_heap_exec.acquire(job.bytes);
                        let off = off_heap_exec.try_acquire(job.bytes / 2);
                        let cached = on_heap_storage.try_acquire(job.bytes / 4);
                        if let Err(e) = &exec {
                            tracing::warn!(task = job.task.get(), error = %e, "running without execution memory");
                        }
                        thread::sleep(task_time);
                        drop((exec, off, cached));
                    }
                    let peaks = poller.get_task_metric_peaks(job.task);
                    tracing::debug!(task = job.task.get(), stage = %job.stage, ?peaks, "task finished");
                    poller.on_task_completion(job.task, job.stage);
                })
        })
        .collect::<std::io::Result<_>>()
        .context("spawning worker threads")?;

    let done = Arc::new(AtomicBool::new(false));
    let heartbeat = {
        let poller = Arc::clone(&poller);
        let done = Arc::clone(&done);
        let period = Duration::from_millis(args.heartbeat_ms.max(1));
        let json = args.json;
        thread::Builder::new()
            .name("heartbeater".into())
            .spawn(move || {
                let mut summary: HashMap<StageKey, MetricVector> = HashMap::new();
                let mut beat = 0u64;
                while !done.load(Ordering::Acquire) {
                    thread::sleep(period);
                    if heartbeat_polls {
                        poller.poll();
                    }
                    let peaks = poller.get_and_reset_stage_peaks();
                    for line in render_reports(poller.layout(), beat, &peaks, json) {
                        println!("{line}");
                    }
                    for (key, values) in peaks {
                        summary
                            .entry(key)
                            .and_modify(|acc| acc.merge_max(&values))
                            .or_insert(values);
                    }
                    beat += 1;
                }
                summary
            })
            .context("spawning heartbeat thread")?
    };

    for w in workers {
        if w.join().is_err() {
            tracing::error!("worker thread panicked");
        }
    }
    done.store(true, Ordering::Release);
    let summary = heartbeat
        .join()
        .map_err(|_| anyhow::anyhow!("heartbeat thread panicked"))?;

    if !poller.stop() {
        tracing::warn!("poller timer still busy at shutdown");
    }
    tracing::info!(
        cycles = poller.driver().completed_cycles(),
        failed = poller.driver().failed_cycles(),
        stages = summary.len(),
        "simulation finished"
    );

    let mut keys: Vec<_> = summary.keys().copied().collect();
    keys.sort();
    println!("-- peak per stage across all heartbeats --");
    for key in keys {
        let named = poller.layout().named(&summary[&key]);
        println!("stage {key}: {}", format_peaks(&named));
    }
    Ok(())
}

fn render_reports(
    layout: &MetricLayout,
    heartbeat: u64,
    peaks: &HashMap<StageKey, MetricVector>,
    json: bool,
) -> Vec<String> {
    let mut keys: Vec<_> = peaks.keys().copied().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| {
            let report = StageReport {
                heartbeat,
                stage: key.to_string(),
                peaks: layout.named(&peaks[&key]),
            };
            if json {
                serde_json::to_string(&report).unwrap_or_default()
            } else {
                format!("[hb {}] stage {}: {}", report.heartbeat, report.stage, format_peaks(&report.peaks))
            }
        })
        .collect()
}

fn format_peaks(named: &BTreeMap<String, i64>) -> String {
    named
        .iter()
        .filter(|(_, v)| **v != 0)
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_interval_overrides_env_config() {
        let mut config = PollerConfig::default().with_poll_interval_ms(500);
        apply_overrides(&mut config, Some(-1));
        assert_eq!(config.poll_interval(), None);

        let mut config = PollerConfig::default().with_poll_interval_ms(500);
        apply_overrides(&mut config, None);
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn jobs_have_unique_ids_grouped_by_stage() {
        let jobs = build_jobs(2, 3, 10).unwrap();
        assert_eq!(jobs.len(), 6);
        assert_eq!(jobs[0].stage, StageKey::new(0, 0));
        assert_eq!(jobs[5].stage, StageKey::new(1, 0));
        assert_eq!(jobs[5].task, TaskId::new(5));
        assert_eq!(jobs.iter().map(|j| j.bytes).collect::<Vec<_>>(), vec![10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn oversized_job_counts_are_rejected() {
        assert!(build_jobs(u64::MAX, 2, 10).is_err());
        assert!(build_jobs(MAX_JOBS + 1, 1, 10).is_err());
        let jobs = build_jobs(1, 3, u64::MAX).unwrap();
        assert_eq!(jobs[2].bytes, u64::MAX);
    }

    #[test]
    fn json_reports_are_sorted_by_stage() {
        let layout = MetricLayout::new(["heap", "exec"]).unwrap();
        let mut peaks = HashMap::new();
        peaks.insert(StageKey::new(2, 0), MetricVector::from([1, 2]));
        peaks.insert(StageKey::new(1, 1), MetricVector::from([3, 0]));
        let lines = render_reports(&layout, 4, &peaks, true);
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["stage"], "1.1");
        assert_eq!(first["heartbeat"], 4);
        assert_eq!(first["peaks"]["heap"], 3);
    }

    #[test]
    fn human_report_skips_zero_slots() {
        let layout = MetricLayout::new(["heap", "exec"]).unwrap();
        let mut peaks = HashMap::new();
        peaks.insert(StageKey::new(1, 0), MetricVector::from([0, 7]));
        let lines = render_reports(&layout, 0, &peaks, false);
        assert_eq!(lines, vec!["[hb 0] stage 1.0: exec=7".to_string()]);
    }
}
