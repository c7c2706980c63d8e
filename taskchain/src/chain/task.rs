//! Task records and the fixed-size arena that backs them.

use crate::chain::cell::PayloadCell;
use crate::sync::{AtomicBool, AtomicU32, Ordering};

/// Raw link value meaning "no record".
const NIL: u32 = u32::MAX;

/// Largest pool the arena can address. `NIL` is reserved as the sentinel.
pub const MAX_CAPACITY: usize = NIL as usize;

/// Newtype for arena indices so links can't be confused with payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        debug_assert!(raw != NIL);
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Encodes an optional link into its atomic representation.
    #[inline]
    pub const fn encode(link: Option<Self>) -> u32 {
        match link {
            Some(idx) => idx.0,
            None => NIL,
        }
    }

    #[inline]
    pub const fn decode(raw: u32) -> Option<Self> {
        if raw == NIL { None } else { Some(Self(raw)) }
    }
}

impl From<SlotIndex> for usize {
    #[inline]
    fn from(idx: SlotIndex) -> Self {
        idx.0 as Self
    }
}

/// A pending task: payload, completion flag and forward link.
///
/// Field ownership:
/// - `value` is written by the producer before the record is linked, then frozen.
/// - `completed` goes false to true once, written only by the consumer.
/// - `next` is written once by the producer when the following record is appended.
pub struct TaskRecord {
    value: PayloadCell<u64>,
    completed: AtomicBool,
    next: AtomicU32,
}

impl TaskRecord {
    fn new() -> Self {
        Self {
            value: PayloadCell::new(0),
            completed: AtomicBool::new(false),
            next: AtomicU32::new(NIL),
        }
    }

    /// Stores the payload.
    ///
    /// # Safety
    ///
    /// Only the producer may call this, and only before the record is
    /// reachable from the list head.
    #[inline]
    pub unsafe fn write_value(&self, value: u64) {
        // SAFETY: the record is unpublished, so the producer is its only accessor.
        unsafe {
            *self.value.get().get() = value;
        }
    }

    /// Reads the payload.
    ///
    /// # Safety
    ///
    /// The caller is either the producer, or the consumer after reaching this
    /// record through an Acquire load of `head` or of a predecessor's `next`.
    #[inline]
    pub unsafe fn value(&self) -> u64 {
        // SAFETY: the payload write happens-before the Release store that
        // published the record, and it is never written again.
        unsafe { *self.value.get().get() }
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Marks the record done. Consumer-only.
    #[inline]
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn next(&self) -> Option<SlotIndex> {
        SlotIndex::decode(self.next.load(Ordering::Acquire))
    }

    /// Links `next` after this record. Producer-only, write-once.
    #[inline]
    pub fn link(&self, next: SlotIndex) {
        debug_assert_eq!(self.next.load(Ordering::Relaxed), NIL, "next is write-once");
        self.next.store(next.raw(), Ordering::Release);
    }
}

/// Preallocated backing store for task records.
///
/// Records are handed out by index and never freed while the pool lives, so
/// a consumer holding a stale index always reads valid memory.
pub struct TaskPool {
    records: Box<[TaskRecord]>,
}

impl TaskPool {
    /// Allocates `capacity` fresh records.
    ///
    /// `capacity` must not exceed [`MAX_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity <= MAX_CAPACITY);
        let records = (0..capacity).map(|_| TaskRecord::new()).collect();
        Self { records }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn record(&self, idx: SlotIndex) -> &TaskRecord {
        &self.records[usize::from(idx)]
    }
}
