//! Task chain correctness and throughput benchmark.
//!
//! Usage:
//!     cargo run --release --bin taskchain-bench -- --tasks 1000000 --iterations 20
//!
//! Environment variables (overridden by flags):
//!     TASKCHAIN_TASKS=N             Tasks per iteration (default: 10000000)
//!     TASKCHAIN_ITERATIONS=K        Iterations (default: 10)
//!     TASKCHAIN_TRIM_THRESHOLD=T    Trim when more than T records are live (default: 1)
//!     TASKCHAIN_BACKOFF=yield       Consumer back-off: yield, spin, spin-then-yield
//!     PRODUCER_CPU=0                Pin producer to a CPU
//!     CONSUMER_CPU=2                Pin consumer to a CPU
//!
//! Exits with status 1 if any iteration's sum is wrong.

use std::process::ExitCode;

use taskchain::config::RunConfig;
use taskchain::harness::{self, HarnessError};

fn main() -> ExitCode {
    taskchain::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("taskchain-bench: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every iteration matched.
fn run(args: &[String]) -> Result<bool, HarnessError> {
    let mut config = RunConfig::from_env()?;
    config.apply_args(args)?;

    println!(
        "taskchain (tasks={}, iterations={}, trim_threshold={}, backoff={}):",
        config.tasks, config.iterations, config.trim_threshold, config.backoff
    );

    let summary = harness::run_with(&config, |report| println!("{report}"))?;

    let failed = summary.failures().count();
    if let Some(best) = summary.best() {
        let ops_per_ms = u128::from(best.tasks) * 1_000_000 / best.elapsed.as_nanos().max(1);
        println!(
            "best: {} ms, {} ops/ms, total: {} ms, failed: {}/{}",
            best.elapsed.as_millis(),
            ops_per_ms,
            summary.total_elapsed().as_millis(),
            failed,
            summary.reports.len()
        );
    }

    Ok(failed == 0)
}

fn print_usage() {
    eprintln!(
        r"taskchain-bench - SPSC pending task chain benchmark

USAGE:
    taskchain-bench [OPTIONS]

OPTIONS:
    -n, --tasks <N>              Tasks per iteration (default: 10000000)
    -i, --iterations <K>         Setup/run/teardown iterations (default: 10)
    -t, --trim-threshold <T>     Trim when more than T records are live (default: 1)
    -b, --backoff <KIND>         yield | spin | spin-then-yield (default: yield)
        --producer-cpu <CPU>     Pin the producer thread
        --consumer-cpu <CPU>     Pin the consumer thread
    -h, --help                   Print this help message

EXAMPLE:
    taskchain-bench --tasks 1000000 --iterations 100 --backoff spin-then-yield
"
    );
}
