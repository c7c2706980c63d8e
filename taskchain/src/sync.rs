//! Synchronization primitives used by the task chain.
//!
//! Under `--cfg loom` the atomics and `Arc` come from `loom` so the model
//! checker can explore every interleaving of the producer and consumer.
//! Otherwise they are the standard library types.

#[cfg(not(loom))]
pub(crate) use std::sync::Arc;
#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::Arc;
#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU32, Ordering};
