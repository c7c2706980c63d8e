//! Run harness: timed producer/consumer iterations checked against a
//! closed-form sum.
//!
//! Each iteration preallocates a pool of `tasks` records, spawns one producer
//! thread publishing `1..=tasks` and one consumer thread polling until all of
//! them are completed, then compares the consumer's result with
//! `tasks * (tasks + 1) / 2`. Repeating the whole sequence gives a race more
//! chances to show up as a mismatch.
//!
//! A mismatch is reported in [`IterationReport`], never raised as an error.

use std::fmt;
use std::thread;
use std::time::Duration;

use minstant::Instant;

use crate::config::{ConfigError, RunConfig};
use crate::pending::{self, ChannelError, ProduceError, Producer};
use crate::trace::{debug, info, warn};

/// Error running the harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to create task chain: {0}")]
    Channel(#[from] ChannelError),
    #[error("producer failed: {0}")]
    Produce(#[from] ProduceError),
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{role} thread panicked")]
    ThreadPanicked { role: &'static str },
}

/// Sum of `1..=n`, wrapped to `u64` the same way the consumer accumulates.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn expected_sum(n: u64) -> u64 {
    let n = u128::from(n);
    // Truncation matches the consumer's wrapping accumulator.
    (n * (n + 1) / 2) as u64
}

/// Outcome of one setup/run/teardown cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub iteration: u32,
    pub tasks: u64,
    pub result: u64,
    pub expected: u64,
    pub completed: u64,
    /// Consumer scan passes until every task was seen.
    pub passes: u64,
    /// Wall-clock time from thread start to both joins.
    pub elapsed: Duration,
    /// Whether the final trim left the chain empty.
    pub drained: bool,
}

impl IterationReport {
    /// True when the sum and completion count both match.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result == self.expected && self.completed == self.tasks
    }
}

impl fmt::Display for IterationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(
                f,
                "taskchain result: {}, ok, cost {} ms",
                self.result,
                self.elapsed.as_millis()
            )
        } else {
            write!(
                f,
                "taskchain result: {}, not ok, expected {}",
                self.result, self.expected
            )
        }
    }
}

/// Every iteration of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<IterationReport>,
}

impl RunSummary {
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.reports.iter().all(IterationReport::is_ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &IterationReport> {
        self.reports.iter().filter(|r| !r.is_ok())
    }

    #[must_use]
    pub fn total_elapsed(&self) -> Duration {
        self.reports.iter().map(|r| r.elapsed).sum()
    }

    /// Fastest iteration, if any ran.
    #[must_use]
    pub fn best(&self) -> Option<&IterationReport> {
        self.reports.iter().min_by_key(|r| r.elapsed)
    }
}

/// Runs every configured iteration.
///
/// # Errors
///
/// See [`run_with`].
pub fn run(config: &RunConfig) -> Result<RunSummary, HarnessError> {
    run_with(config, |_| {})
}

/// Runs every configured iteration, handing each report to `on_report` as
/// soon as it is available.
///
/// # Errors
///
/// Returns [`HarnessError`] if the configuration is invalid, a thread can't
/// be spawned or a role thread panics. Result mismatches are not errors.
pub fn run_with<F>(config: &RunConfig, mut on_report: F) -> Result<RunSummary, HarnessError>
where
    F: FnMut(&IterationReport),
{
    config.validate()?;
    info!(
        tasks = config.tasks,
        iterations = config.iterations,
        trim_threshold = config.trim_threshold,
        backoff = %config.backoff,
        "starting run"
    );

    let mut summary = RunSummary::default();
    for iteration in 0..config.iterations {
        let report = run_iteration(config, iteration)?;
        on_report(&report);
        summary.reports.push(report);
    }
    Ok(summary)
}

/// Runs one iteration: allocate, spawn, join, verify, drain.
///
/// If the producer fails part-way, the consumer thread is left polling and
/// is detached.
///
/// # Errors
///
/// Returns [`HarnessError`] if the chain can't be created, a thread can't be
/// spawned or a role thread panics.
pub fn run_iteration(config: &RunConfig, iteration: u32) -> Result<IterationReport, HarnessError> {
    let tasks = config.tasks;
    // An unaddressable count is rejected by `channel` as too large.
    let capacity = usize::try_from(tasks).unwrap_or(usize::MAX);
    let (mut producer, mut consumer) = pending::channel(capacity, config.trim_threshold)?;
    let mut backoff = config.backoff.build();
    let (producer_cpu, consumer_cpu) = (config.producer_cpu, config.consumer_cpu);

    let start = Instant::now();

    let producer_thread = thread::Builder::new()
        .name("taskchain-producer".into())
        .spawn(move || -> Result<Producer, ProduceError> {
            pin_to_cpu(producer_cpu);
            for value in 1..=tasks {
                producer.produce(value)?;
            }
            Ok(producer)
        })
        .map_err(|source| HarnessError::Spawn {
            role: "producer",
            source,
        })?;

    let consumer_thread = thread::Builder::new()
        .name("taskchain-consumer".into())
        .spawn(move || {
            pin_to_cpu(consumer_cpu);
            let passes = consumer.run_until(tasks, &mut backoff);
            (consumer, passes)
        })
        .map_err(|source| HarnessError::Spawn {
            role: "consumer",
            source,
        })?;

    let mut producer = producer_thread
        .join()
        .map_err(|_| HarnessError::ThreadPanicked { role: "producer" })??;
    let (consumer, passes) = consumer_thread
        .join()
        .map_err(|_| HarnessError::ThreadPanicked { role: "consumer" })?;

    let elapsed = start.elapsed();

    producer.trim();
    let drained = producer.is_empty();

    let report = IterationReport {
        iteration,
        tasks,
        result: consumer.result(),
        expected: expected_sum(tasks),
        completed: consumer.completed_count(),
        passes,
        elapsed,
        drained,
    };

    if report.is_ok() {
        info!(
            iteration,
            result = report.result,
            passes,
            elapsed_ms = elapsed.as_millis(),
            "iteration ok"
        );
    } else {
        warn!(
            iteration,
            result = report.result,
            expected = report.expected,
            completed = report.completed,
            "iteration result mismatch"
        );
    }

    Ok(report)
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        if core_affinity::set_for_current(core_affinity::CoreId { id }) {
            debug!(cpu = id, "pinned thread");
        } else {
            warn!(cpu = id, "failed to pin thread");
        }
    }
}
