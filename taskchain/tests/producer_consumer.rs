//! End-to-end tests running the producer and consumer on separate threads.
//!
//! # Running with tracing
//!
//! ```bash
//! RUST_LOG=taskchain=debug cargo test --features tracing --test producer_consumer -- --nocapture
//! ```

#![cfg(not(loom))]

use std::sync::Once;
use std::thread;

use taskchain::backoff::{Backoff, BackoffKind, SpinThenYield, YieldNow};
use taskchain::config::RunConfig;
use taskchain::harness::{self, expected_sum};
use taskchain::pending::{self, Consumer, Producer};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        taskchain::init_tracing();
    });
}

/// Runs `tasks` values through a fresh chain on two threads and returns both
/// handles after they join.
fn run_threads<B>(tasks: u64, trim_threshold: usize, mut backoff: B) -> (Producer, Consumer, u64)
where
    B: Backoff + 'static,
{
    let capacity = usize::try_from(tasks).expect("task count fits in usize");
    let (mut producer, mut consumer) =
        pending::channel(capacity, trim_threshold).expect("create chain");

    let consumer_handle = thread::Builder::new()
        .name("test-consumer".into())
        .spawn(move || {
            let passes = consumer.run_until(tasks, &mut backoff);
            (consumer, passes)
        })
        .expect("spawn consumer");

    let producer_handle = thread::Builder::new()
        .name("test-producer".into())
        .spawn(move || {
            for value in 1..=tasks {
                producer.produce(value).expect("pool sized to task count");
            }
            producer
        })
        .expect("spawn producer");

    let producer = producer_handle.join().expect("producer panicked");
    let (consumer, passes) = consumer_handle.join().expect("consumer panicked");
    (producer, consumer, passes)
}

#[test]
fn sum_matches_closed_form_for_various_sizes() {
    init_test_tracing();

    for tasks in [1, 2, 3, 1_000, 100_000] {
        let (mut producer, consumer, passes) = run_threads(tasks, 1, YieldNow);

        assert_eq!(consumer.completed_count(), tasks, "tasks={tasks}");
        assert_eq!(consumer.result(), expected_sum(tasks), "tasks={tasks}");
        assert!(passes >= 1);

        producer.trim();
        assert!(producer.is_empty(), "tasks={tasks} left records behind");
        assert_eq!(producer.produced(), usize::try_from(tasks).unwrap());
    }
}

#[test]
fn trim_threshold_does_not_affect_result() {
    init_test_tracing();

    for threshold in [0, 1, 16, usize::MAX] {
        let (mut producer, consumer, _) = run_threads(20_000, threshold, SpinThenYield::default());
        assert_eq!(consumer.result(), expected_sum(20_000), "threshold={threshold}");

        producer.trim();
        assert!(producer.is_empty(), "threshold={threshold}");
    }
}

#[test]
fn never_trimming_keeps_every_record_reachable() {
    let (producer, consumer, _) = run_threads(500, usize::MAX, YieldNow);
    assert_eq!(consumer.result(), expected_sum(500));

    let snapshot = producer.snapshot();
    assert_eq!(snapshot.len(), 500);
    assert_eq!(producer.len(), 500);
    assert!(snapshot.iter().all(|task| task.completed));
    assert!(
        snapshot
            .iter()
            .zip(1..)
            .all(|(task, expected)| task.value == expected)
    );
}

#[test]
fn consumer_waits_for_late_producer() {
    let (mut producer, mut consumer) = pending::channel(4, 1).unwrap();

    let consumer_handle = thread::spawn(move || {
        consumer.run_until(4, &mut YieldNow);
        consumer
    });

    thread::sleep(std::time::Duration::from_millis(20));
    for value in [10, 20, 30, 40] {
        producer.produce(value).unwrap();
        thread::yield_now();
    }

    let consumer = consumer_handle.join().unwrap();
    assert_eq!(consumer.result(), 100);
    assert_eq!(consumer.completed_count(), 4);
}

#[test]
fn harness_repeats_and_verifies_every_iteration() {
    init_test_tracing();

    let config = RunConfig {
        tasks: 50_000,
        iterations: 4,
        backoff: BackoffKind::SpinThenYield,
        ..RunConfig::default()
    };
    let summary = harness::run(&config).unwrap();

    assert_eq!(summary.reports.len(), 4);
    for (i, report) in summary.reports.iter().enumerate() {
        assert_eq!(report.iteration, u32::try_from(i).unwrap());
        assert!(report.is_ok(), "{report}");
        assert!(report.drained);
        assert_eq!(report.expected, 1_250_025_000);
    }
    assert!(summary.total_elapsed() >= summary.best().unwrap().elapsed);
}
