//! CAS-free single-producer single-consumer pending task chain.
//!
//! One producer thread appends task records and trims the ones already
//! finished; one consumer thread rescans from the head, completes new records
//! and sums their payloads. The two roles share a linked list with strictly
//! partitioned write-sets and synchronize only through release/acquire loads
//! and stores on the links, with no locks and no compare-and-swap.
//!
//! - [`pending`] - the public producer/consumer handles
//! - [`backoff`] - consumer yield strategies between passes
//! - [`harness`] - timed, self-checking runs over the chain
//! - [`config`] - run configuration from defaults, environment and flags

pub mod backoff;
pub(crate) mod chain;
pub mod config;
pub mod harness;
pub mod pending;
pub(crate) mod sync;
mod trace;

pub use trace::init_tracing;

#[doc(inline)]
pub use pending::{Consumer, Producer, channel};
