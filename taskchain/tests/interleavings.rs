//! Property tests over single-threaded interleavings of producer and
//! consumer operations.

#![cfg(not(loom))]

use std::collections::BTreeSet;

use proptest::prelude::*;

use taskchain::pending;

#[derive(Debug, Clone, Copy)]
enum Op {
    Produce,
    Pass,
    Trim,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Produce),
        2 => Just(Op::Pass),
        1 => Just(Op::Trim),
    ]
}

proptest! {
    #[test]
    fn chain_invariants_hold(ops in prop::collection::vec(op(), 1..200), threshold in 0usize..4) {
        let (mut producer, mut consumer) = pending::channel(ops.len(), threshold).unwrap();
        let mut next = 1u64;
        let mut ever_completed = BTreeSet::new();

        for op in ops {
            match op {
                Op::Produce => {
                    producer.produce(next).unwrap();
                    next += 1;
                }
                Op::Pass => {
                    consumer.pass();
                }
                Op::Trim => {
                    producer.trim();
                    let snapshot = producer.snapshot();
                    prop_assert!(snapshot.first().is_none_or(|head| !head.completed));
                }
            }

            let snapshot = producer.snapshot();
            prop_assert_eq!(snapshot.len(), producer.len());

            // Completed records form a prefix of the live chain.
            let first_open = snapshot.iter().position(|t| !t.completed).unwrap_or(snapshot.len());
            prop_assert!(snapshot[first_open..].iter().all(|t| !t.completed));

            // Live records are the most recent values, in publication order.
            let oldest_live = next - snapshot.len() as u64;
            for (task, expected) in snapshot.iter().zip(oldest_live..) {
                prop_assert_eq!(task.value, expected);
            }

            // Completion never reverts.
            for task in &snapshot {
                if ever_completed.contains(&task.value) {
                    prop_assert!(task.completed);
                }
                if task.completed {
                    ever_completed.insert(task.value);
                }
            }

            // Only completed records are ever trimmed.
            for value in 1..oldest_live {
                prop_assert!(ever_completed.contains(&value));
            }
        }

        consumer.pass();
        let published = next - 1;
        prop_assert_eq!(consumer.completed_count(), published);
        prop_assert_eq!(consumer.result(), published * (published + 1) / 2);

        producer.trim();
        prop_assert!(producer.is_empty());

        // A second pass over a drained chain changes nothing.
        prop_assert_eq!(consumer.pass(), 0);
        prop_assert_eq!(consumer.result(), published * (published + 1) / 2);
    }
}
