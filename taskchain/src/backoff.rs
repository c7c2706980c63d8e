//! Consumer back-off between scan passes.
//!
//! The consumer busy-polls the chain. After every pass it calls
//! [`Backoff::snooze`] so the producer gets scheduled on single-core or
//! contended machines. Without a yield the consumer can starve the producer.

use std::fmt;
use std::str::FromStr;

/// Hook invoked once per consumer pass.
///
/// Implementations must not block on anything the producer holds; the
/// consumer is a polling loop, not a waiter.
pub trait Backoff: Send {
    /// Called after each pass over the chain.
    fn snooze(&mut self);

    /// Called when a pass completed at least one record.
    fn reset(&mut self) {}
}

/// Yield the thread after every pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldNow;

impl Backoff for YieldNow {
    #[inline]
    fn snooze(&mut self) {
        #[cfg(not(loom))]
        std::thread::yield_now();
        #[cfg(loom)]
        loom::thread::yield_now();
    }
}

/// Spin-loop hint only; never gives up the CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinLoop;

impl Backoff for SpinLoop {
    #[inline]
    fn snooze(&mut self) {
        std::hint::spin_loop();
    }
}

/// Spin for a bounded number of idle passes, then yield on every pass until
/// work shows up again.
#[derive(Debug, Clone, Copy)]
pub struct SpinThenYield {
    spins: u32,
    idle: u32,
}

impl SpinThenYield {
    pub const DEFAULT_SPINS: u32 = 32;

    #[must_use]
    pub const fn new(spins: u32) -> Self {
        Self { spins, idle: 0 }
    }
}

impl Default for SpinThenYield {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPINS)
    }
}

impl Backoff for SpinThenYield {
    #[inline]
    fn snooze(&mut self) {
        if self.idle < self.spins {
            self.idle += 1;
            std::hint::spin_loop();
        } else {
            YieldNow.snooze();
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.idle = 0;
    }
}

/// Selects one of the built-in back-off strategies by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    #[default]
    Yield,
    Spin,
    SpinThenYield,
}

impl BackoffKind {
    /// Builds a fresh strategy of this kind.
    #[must_use]
    pub fn build(self) -> Box<dyn Backoff> {
        match self {
            Self::Yield => Box::new(YieldNow),
            Self::Spin => Box::new(SpinLoop),
            Self::SpinThenYield => Box::new(SpinThenYield::default()),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yield => "yield",
            Self::Spin => "spin",
            Self::SpinThenYield => "spin-then-yield",
        }
    }
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized back-off name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backoff {0:?} (expected yield, spin or spin-then-yield)")]
pub struct UnknownBackoff(pub String);

impl FromStr for BackoffKind {
    type Err = UnknownBackoff;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yield" => Ok(Self::Yield),
            "spin" => Ok(Self::Spin),
            "spin-then-yield" => Ok(Self::SpinThenYield),
            other => Err(UnknownBackoff(other.to_owned())),
        }
    }
}

impl<B: Backoff + ?Sized> Backoff for Box<B> {
    #[inline]
    fn snooze(&mut self) {
        (**self).snooze();
    }

    #[inline]
    fn reset(&mut self) {
        (**self).reset();
    }
}

impl<B: Backoff + ?Sized> Backoff for &mut B {
    #[inline]
    fn snooze(&mut self) {
        (**self).snooze();
    }

    #[inline]
    fn reset(&mut self) {
        (**self).reset();
    }
}
