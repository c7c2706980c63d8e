//! Role-tagged cells for fields with a single writer.
//!
//! # Safety
//!
//! The cells hand out raw `UnsafeCell` access. Callers must uphold the SPSC
//! write-set partition: a producer-role cell is only touched by the producer,
//! and a payload cell is only written before its record is published.

use std::cell::UnsafeCell;
use std::marker::PhantomData;

/// Role marker: fields owned exclusively by the producer.
pub struct ProducerRole;

/// Role marker: record payloads written by the producer before publication
/// and read-only afterwards.
pub struct PayloadRole;

/// Interior-mutable cell with a role marker for nominal type safety.
///
/// The `Role` has no runtime effect. It keeps producer bookkeeping and record
/// payloads from being mixed up at compile time.
#[repr(transparent)]
pub struct RoleCell<T, Role>(UnsafeCell<T>, PhantomData<Role>);

impl<T, Role> RoleCell<T, Role> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value), PhantomData)
    }

    pub const fn get(&self) -> &UnsafeCell<T> {
        &self.0
    }
}

// SAFETY: every RoleCell has one writer. Producer cells are never touched by
// the consumer. Payload cells are written before a Release store makes the
// record reachable and only read after the matching Acquire load.
unsafe impl<T: Send, Role> Sync for RoleCell<T, Role> {}
unsafe impl<T: Send, Role> Send for RoleCell<T, Role> {}

/// Cell owned exclusively by the producer.
pub type ProducerCell<T> = RoleCell<T, ProducerRole>;

/// Record payload cell, frozen once the record is published.
pub type PayloadCell<T> = RoleCell<T, PayloadRole>;
