//! CAS-free SPSC linked list threaded through a [`TaskPool`].
//!
//! # Write-set partition
//!
//! | Field | Writer | Reader |
//! |---|---|---|
//! | `head` | producer (append on empty, trim) | consumer (scan start) |
//! | `tail`, `size` | producer | producer |
//! | record `value`, `next` | producer | consumer |
//! | record `completed` | consumer | producer (trim) |
//!
//! The only field both roles touch is `head`. The producer only ever moves it
//! past records the consumer already completed, so a consumer that observes a
//! stale `head` rescans completed records instead of missing live ones.
//!
//! # Ordering
//!
//! ```text
//! Producer writes value, then Release-stores head/next  →  consumer Acquire-loads head/next, then reads value
//! Consumer Release-stores completed                      →  producer Acquire-loads completed while trimming
//! ```
//!
//! There are no read-modify-write atomics and no fences. Records are never
//! reclaimed while the list lives, so there is no ABA or use-after-free to
//! guard against.
//!
//! # Safety
//!
//! Producer operations are `unsafe`: the caller guarantees a single producer.

use crate::chain::cell::ProducerCell;
use crate::chain::task::{SlotIndex, TaskPool, TaskRecord};
use crate::sync::{AtomicU32, Ordering};

/// Head pointer, shared between producer and consumer.
#[repr(C)]
#[repr(align(64))]
pub struct SharedState {
    pub head: AtomicU32,
}

/// Producer-side bookkeeping: tail link and live record count.
#[repr(C)]
#[repr(align(64))]
pub struct ProducerState {
    pub tail: ProducerCell<Option<SlotIndex>>,
    pub size: ProducerCell<usize>,
}

/// Singly linked chain from `head` to `tail` over an arena of records.
pub struct TaskList {
    shared: SharedState,
    producer: ProducerState,
    pool: TaskPool,
}

impl TaskList {
    pub fn new(pool: TaskPool) -> Self {
        Self {
            shared: SharedState {
                head: AtomicU32::new(SlotIndex::encode(None)),
            },
            producer: ProducerState {
                tail: ProducerCell::new(None),
                size: ProducerCell::new(0),
            },
            pool,
        }
    }

    #[inline]
    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    #[inline]
    pub fn record(&self, idx: SlotIndex) -> &TaskRecord {
        self.pool.record(idx)
    }

    /// Current head, the consumer's scan start.
    #[inline]
    pub fn peek_head(&self) -> Option<SlotIndex> {
        SlotIndex::decode(self.shared.head.load(Ordering::Acquire))
    }

    /// Number of records between head and tail.
    ///
    /// # Safety
    ///
    /// Producer-only.
    #[inline]
    pub unsafe fn len(&self) -> usize {
        // SAFETY: the producer has exclusive access to its size field.
        unsafe { *self.producer.size.get().get() }
    }

    /// Links `slot` at the tail.
    ///
    /// # Safety
    ///
    /// Caller must ensure:
    /// - Only the producer calls this
    /// - `slot` was never appended before and its payload is already written
    #[inline]
    pub unsafe fn append(&self, slot: SlotIndex) {
        // SAFETY: the producer has exclusive access to its tail field.
        let tail = unsafe { &mut *self.producer.tail.get().get() };

        match *tail {
            // Empty list: publishing via head (release pairs with the consumer's acquire)
            None => self
                .shared
                .head
                .store(SlotIndex::encode(Some(slot)), Ordering::Release),
            Some(prev) => self.pool.record(prev).link(slot),
        }
        *tail = Some(slot);

        // SAFETY: the producer has exclusive access to its size field.
        unsafe {
            *self.producer.size.get().get() += 1;
        }
    }

    /// Moves `head` past the leading run of completed records.
    ///
    /// Stops at the first incomplete record even if later ones are done.
    /// Empties `tail` when the list drains. Returns the number trimmed.
    ///
    /// # Safety
    ///
    /// Producer-only.
    pub unsafe fn advance_head_past_completed(&self) -> usize {
        // The producer is head's only writer, so its own last store is current.
        let mut head = SlotIndex::decode(self.shared.head.load(Ordering::Relaxed));
        let mut trimmed = 0;

        while let Some(idx) = head {
            let record = self.pool.record(idx);
            if !record.is_completed() {
                break;
            }
            head = record.next();
            trimmed += 1;
            self.shared
                .head
                .store(SlotIndex::encode(head), Ordering::Release);
        }

        // SAFETY: the producer has exclusive access to its bookkeeping fields.
        unsafe {
            *self.producer.size.get().get() -= trimmed;
            if head.is_none() {
                *self.producer.tail.get().get() = None;
            }
        }

        trimmed
    }

    /// Walks the live chain from `head` to the end.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.peek_head(),
        }
    }
}

/// Iterator over records reachable from `head` at the time it was created.
pub struct Iter<'a> {
    list: &'a TaskList,
    cursor: Option<SlotIndex>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TaskRecord;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let record = self.list.record(self.cursor?);
        self.cursor = record.next();
        Some(record)
    }
}

// SAFETY: TaskList is Send because every field is Send (atomics, role cells, pool).
unsafe impl Send for TaskList {}

// SAFETY: TaskList is Sync because cross-role access goes through atomics
// with Release/Acquire ordering and role cells are single-writer.
unsafe impl Sync for TaskList {}
