//! Producer and consumer handles for the pending task chain.
//!
//! An unbounded FIFO of pending tasks backed by a preallocated record pool.
//! Neither side uses locks or compare-and-swap; correctness rests on the
//! write-set partition documented in [`crate::chain::list`].
//!
//! # Overview
//!
//! - [`Producer`] - appends tasks and trims completed ones from the head
//! - [`Consumer`] - rescans from the head, completing and summing new tasks
//!
//! # Example
//!
//! ```
//! use taskchain::backoff::YieldNow;
//! use taskchain::pending;
//!
//! let (mut producer, mut consumer) = pending::channel(3, pending::DEFAULT_TRIM_THRESHOLD)?;
//!
//! let handle = std::thread::spawn(move || {
//!     consumer.run_until(3, &mut YieldNow);
//!     consumer
//! });
//!
//! for value in 1..=3 {
//!     producer.produce(value)?;
//! }
//!
//! let consumer = handle.join().unwrap();
//! assert_eq!(consumer.result(), 6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::cell::Cell;
use std::marker::PhantomData;

use crate::backoff::Backoff;
use crate::chain::list::TaskList;
use crate::chain::task::{MAX_CAPACITY, SlotIndex, TaskPool};
use crate::sync::Arc;
use crate::trace::{debug, trace};

/// Trim once more than this many records are live after an append.
pub const DEFAULT_TRIM_THRESHOLD: usize = 1;

/// Error creating a task chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("task pool capacity must be greater than 0")]
    ZeroCapacity,
    #[error("task pool capacity {requested} exceeds the maximum of {max}")]
    CapacityTooLarge { requested: usize, max: usize },
}

/// Error publishing a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProduceError {
    #[error("task pool exhausted: all {capacity} records are in use")]
    PoolExhausted { capacity: usize },
}

/// A record as seen by the producer when inspecting the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub value: u64,
    pub completed: bool,
}

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of the task chain.
///
/// `Producer` is [`Send`] but **not** [`Sync`]: it can move to the producer
/// thread, but `&Producer` can't be shared.
pub struct Producer {
    list: Arc<TaskList>,
    next_slot: usize,
    trim_threshold: usize,
    _unsync: PhantomUnsync,
}

/// Read end of the task chain.
///
/// Owns the running completion count and result. Same thread-safety rules as
/// [`Producer`].
pub struct Consumer {
    list: Arc<TaskList>,
    completed: u64,
    result: u64,
    _unsync: PhantomUnsync,
}

/// Creates a task chain over a pool of `capacity` preallocated records.
///
/// The whole pool is allocated here so publishing never allocates.
///
/// # Errors
///
/// Returns [`ChannelError`] if `capacity` is zero or exceeds what a
/// [`SlotIndex`] can address.
pub fn channel(
    capacity: usize,
    trim_threshold: usize,
) -> Result<(Producer, Consumer), ChannelError> {
    if capacity == 0 {
        return Err(ChannelError::ZeroCapacity);
    }
    if capacity > MAX_CAPACITY {
        return Err(ChannelError::CapacityTooLarge {
            requested: capacity,
            max: MAX_CAPACITY,
        });
    }

    let list = Arc::new(TaskList::new(TaskPool::new(capacity)));
    debug!(capacity, trim_threshold, "task chain created");

    let producer = Producer {
        list: Arc::clone(&list),
        next_slot: 0,
        trim_threshold,
        _unsync: PhantomData,
    };

    let consumer = Consumer {
        list,
        completed: 0,
        result: 0,
        _unsync: PhantomData,
    };

    Ok((producer, consumer))
}

impl Producer {
    /// Publishes `value` in the next unused record, then trims the head if
    /// more than the trim threshold are live.
    ///
    /// # Errors
    ///
    /// Returns [`ProduceError::PoolExhausted`] once every record has been used.
    #[inline]
    pub fn produce(&mut self, value: u64) -> Result<(), ProduceError> {
        let capacity = self.capacity();
        let slot = match u32::try_from(self.next_slot) {
            Ok(raw) if self.next_slot < capacity => SlotIndex::new(raw),
            _ => return Err(ProduceError::PoolExhausted { capacity }),
        };

        // SAFETY: this handle is the only producer, and the slot is fresh:
        // slots are handed out once, in order, so nothing has linked it yet.
        unsafe {
            self.list.record(slot).write_value(value);
            self.list.append(slot);
        }
        self.next_slot += 1;

        if self.len() > self.trim_threshold {
            self.trim();
        }
        Ok(())
    }

    /// Drops the leading run of completed records. Returns how many went.
    #[inline]
    pub fn trim(&mut self) -> usize {
        // SAFETY: this handle is the only producer.
        let trimmed = unsafe { self.list.advance_head_past_completed() };
        if trimmed > 0 {
            trace!(trimmed, "trimmed completed tasks");
        }
        trimmed
    }

    /// Records between head and tail, as tracked by the producer.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: this handle is the only producer.
        unsafe { self.list.len() }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records published so far.
    #[inline]
    #[must_use]
    pub fn produced(&self) -> usize {
        self.next_slot
    }

    /// Size of the preallocated pool.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.list.pool().capacity()
    }

    #[inline]
    #[must_use]
    pub fn trim_threshold(&self) -> usize {
        self.trim_threshold
    }

    /// Walks the chain from head and reports each live record.
    ///
    /// Completion flags may change under a running consumer; the snapshot
    /// reflects what this walk observed.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.list
            .iter()
            .map(|record| TaskSnapshot {
                // SAFETY: the producer wrote every payload itself.
                value: unsafe { record.value() },
                completed: record.is_completed(),
            })
            .collect()
    }
}

impl Consumer {
    /// Walks once from the current head, completing every record not yet done.
    ///
    /// Returns how many records this pass completed. Never yields.
    #[inline]
    pub fn pass(&mut self) -> u64 {
        let mut finished = 0;
        for record in self.list.iter() {
            if record.is_completed() {
                continue;
            }
            // SAFETY: the record was reached through Acquire loads of head or
            // of its predecessor's link, which publish its payload.
            let value = unsafe { record.value() };
            self.result = self.result.wrapping_add(value);
            self.completed += 1;
            record.mark_completed();
            finished += 1;
        }
        finished
    }

    /// Polls the chain until `total` records have been completed.
    ///
    /// Calls `backoff` after every pass. Loops forever if the producer never
    /// publishes `total` records.
    ///
    /// Returns the number of passes taken.
    pub fn run_until<B: Backoff + ?Sized>(&mut self, total: u64, backoff: &mut B) -> u64 {
        let mut passes = 0;
        while self.completed < total {
            if self.pass() > 0 {
                backoff.reset();
            }
            backoff.snooze();
            passes += 1;
        }
        debug!(
            completed = self.completed,
            result = self.result,
            passes,
            "consumer finished"
        );
        passes
    }

    #[inline]
    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    /// Wrapping sum of every completed payload.
    #[inline]
    #[must_use]
    pub fn result(&self) -> u64 {
        self.result
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::backoff::{SpinThenYield, YieldNow};

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(channel(0, 1), Err(ChannelError::ZeroCapacity)));
    }

    #[test]
    fn rejects_unaddressable_capacity() {
        let err = channel(MAX_CAPACITY + 1, 1).err();
        assert_eq!(
            err,
            Some(ChannelError::CapacityTooLarge {
                requested: MAX_CAPACITY + 1,
                max: MAX_CAPACITY,
            })
        );
    }

    #[test]
    fn pool_exhaustion_is_reported() {
        let (mut producer, _consumer) = channel(2, 1).unwrap();
        producer.produce(1).unwrap();
        producer.produce(2).unwrap();
        assert_eq!(
            producer.produce(3),
            Err(ProduceError::PoolExhausted { capacity: 2 })
        );
        assert_eq!(producer.produced(), 2);
    }

    #[test]
    fn three_tasks_sum_to_six_and_drain() {
        let (mut producer, mut consumer) = channel(3, DEFAULT_TRIM_THRESHOLD).unwrap();
        for value in 1..=3 {
            producer.produce(value).unwrap();
        }

        assert_eq!(consumer.pass(), 3);
        assert_eq!(consumer.result(), 6);
        assert_eq!(consumer.completed_count(), 3);

        assert_eq!(producer.trim(), 3);
        assert!(producer.is_empty());
        assert!(producer.snapshot().is_empty());
    }

    #[test]
    fn rescan_without_appends_changes_nothing() {
        let (mut producer, mut consumer) = channel(4, 8).unwrap();
        for value in [5, 7, 11] {
            producer.produce(value).unwrap();
        }

        assert_eq!(consumer.pass(), 3);
        let (result, count) = (consumer.result(), consumer.completed_count());

        assert_eq!(consumer.pass(), 0);
        assert_eq!(consumer.result(), result);
        assert_eq!(consumer.completed_count(), count);
    }

    #[test]
    fn produce_trims_behind_the_consumer() {
        let (mut producer, mut consumer) = channel(8, 1).unwrap();
        producer.produce(1).unwrap();
        producer.produce(2).unwrap();
        assert_eq!(producer.len(), 2);

        consumer.pass();
        // Next append pushes size past the threshold and trims both done records.
        producer.produce(3).unwrap();
        assert_eq!(producer.len(), 1);
        assert_eq!(
            producer.snapshot(),
            vec![TaskSnapshot {
                value: 3,
                completed: false
            }]
        );
    }

    #[test]
    fn high_threshold_defers_trimming() {
        let (mut producer, mut consumer) = channel(4, 10).unwrap();
        for value in 1..=4 {
            producer.produce(value).unwrap();
            consumer.pass();
        }
        assert_eq!(producer.len(), 4);
        assert_eq!(producer.trim(), 4);
        assert_eq!(consumer.result(), 10);
    }

    #[test]
    fn run_until_returns_once_total_reached() {
        let (mut producer, mut consumer) = channel(5, 1).unwrap();
        for value in 1..=5 {
            producer.produce(value).unwrap();
        }
        let passes = consumer.run_until(5, &mut YieldNow);
        assert_eq!(passes, 1);
        assert_eq!(consumer.result(), 15);
    }

    #[test]
    fn send_handles_to_threads() {
        const N: u64 = 10_000;
        let capacity = usize::try_from(N).unwrap();
        let (mut producer, mut consumer) = channel(capacity, DEFAULT_TRIM_THRESHOLD).unwrap();

        let consumer_handle = std::thread::spawn(move || {
            consumer.run_until(N, &mut SpinThenYield::default());
            consumer
        });

        let producer_handle = std::thread::spawn(move || {
            for value in 1..=N {
                producer.produce(value).unwrap();
            }
            producer
        });

        let mut producer = producer_handle.join().unwrap();
        let consumer = consumer_handle.join().unwrap();

        assert_eq!(consumer.completed_count(), N);
        assert_eq!(consumer.result(), N * (N + 1) / 2);

        producer.trim();
        assert!(producer.is_empty());
    }
}
