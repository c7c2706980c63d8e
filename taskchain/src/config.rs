//! Run configuration for the harness and bench binary.
//!
//! Values come from [`RunConfig::default`], then environment variables, then
//! command-line flags, each layer overriding the previous one.

use std::str::FromStr;

use crate::backoff::{BackoffKind, UnknownBackoff};
use crate::pending::DEFAULT_TRIM_THRESHOLD;

/// Default number of tasks published per iteration.
pub const DEFAULT_TASKS: u64 = 10_000_000;

/// Default number of setup/run/teardown iterations.
pub const DEFAULT_ITERATIONS: u32 = 10;

pub const ENV_TASKS: &str = "TASKCHAIN_TASKS";
pub const ENV_ITERATIONS: &str = "TASKCHAIN_ITERATIONS";
pub const ENV_TRIM_THRESHOLD: &str = "TASKCHAIN_TRIM_THRESHOLD";
pub const ENV_BACKOFF: &str = "TASKCHAIN_BACKOFF";
pub const ENV_PRODUCER_CPU: &str = "PRODUCER_CPU";
pub const ENV_CONSUMER_CPU: &str = "CONSUMER_CPU";

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error(transparent)]
    UnknownBackoff(#[from] UnknownBackoff),
    #[error("task count must be greater than 0")]
    ZeroTasks,
}

/// Parameters for a harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Tasks published per iteration; also the record pool size.
    pub tasks: u64,
    /// How many times the whole setup/run/teardown sequence repeats.
    pub iterations: u32,
    /// The producer trims when more than this many records are live.
    pub trim_threshold: usize,
    /// Consumer yield strategy between passes.
    pub backoff: BackoffKind,
    /// Pin the producer thread to this core.
    pub producer_cpu: Option<usize>,
    /// Pin the consumer thread to this core.
    pub consumer_cpu: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tasks: DEFAULT_TASKS,
            iterations: DEFAULT_ITERATIONS,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            backoff: BackoffKind::default(),
            producer_cpu: None,
            consumer_cpu: None,
        }
    }
}

impl RunConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, keyed by the `ENV_*` names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a present value fails to parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TASKS) {
            self.tasks = parse_value(ENV_TASKS, &v)?;
        }
        if let Some(v) = lookup(ENV_ITERATIONS) {
            self.iterations = parse_value(ENV_ITERATIONS, &v)?;
        }
        if let Some(v) = lookup(ENV_TRIM_THRESHOLD) {
            self.trim_threshold = parse_value(ENV_TRIM_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_BACKOFF) {
            self.backoff = v.parse()?;
        }
        if let Some(v) = lookup(ENV_PRODUCER_CPU) {
            self.producer_cpu = Some(parse_value(ENV_PRODUCER_CPU, &v)?);
        }
        if let Some(v) = lookup(ENV_CONSUMER_CPU) {
            self.consumer_cpu = Some(parse_value(ENV_CONSUMER_CPU, &v)?);
        }
        Ok(())
    }

    /// Applies command-line flags. `args` excludes the program name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unknown flags, missing or bad values.
    pub fn apply_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<(), ConfigError> {
        let mut iter = args.iter().map(AsRef::<str>::as_ref);
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .ok_or_else(|| ConfigError::MissingValue(flag.to_owned()))
            };
            match flag {
                "--tasks" | "-n" => self.tasks = parse_value("--tasks", value()?)?,
                "--iterations" | "-i" => {
                    self.iterations = parse_value("--iterations", value()?)?;
                }
                "--trim-threshold" | "-t" => {
                    self.trim_threshold = parse_value("--trim-threshold", value()?)?;
                }
                "--backoff" | "-b" => self.backoff = value()?.parse()?,
                "--producer-cpu" => {
                    self.producer_cpu = Some(parse_value("--producer-cpu", value()?)?);
                }
                "--consumer-cpu" => {
                    self.consumer_cpu = Some(parse_value("--consumer-cpu", value()?)?);
                }
                other => return Err(ConfigError::UnknownArgument(other.to_owned())),
            }
        }
        Ok(())
    }

    /// Checks the combination of values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTasks`] for an empty workload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tasks == 0 {
            return Err(ConfigError::ZeroTasks);
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
    })
}
