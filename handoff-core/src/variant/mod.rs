//! Counting semaphores built from two or three binary locks.
//!
//! Every variant keeps a signed `count` behind a `guard` lock and blocks
//! waiters on a `gate` lock. They differ in how a released unit is handed to
//! a blocked waiter:
//!
//! - [`NaiveSemaphore`]: releases both locks before the waiter has claimed the
//!   gate. Two back-to-back signals can lose a wake-up and strand a waiter.
//!   Kept as the reference for the defect.
//! - [`HandoffSemaphore`]: the signaller leaves `guard` locked and the woken
//!   waiter releases it, so no second signal can run during the handoff.
//! - [`TurnstileSemaphore`]: a third lock lets only one thread through the
//!   blocking path at a time.
//! - [`ThresholdSemaphore`]: `gate` is open exactly while a unit is available.
//!
//! None of them guarantee FIFO wake order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display as DisplayMacro, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use thiserror::Error;

use crate::{jitter::Jitter, permit::Permit};

mod handoff;
mod naive;
mod threshold;
mod turnstile;

pub use handoff::HandoffSemaphore;
pub use naive::NaiveSemaphore;
pub use threshold::ThresholdSemaphore;
pub use turnstile::TurnstileSemaphore;

/// The operations shared by every variant.
pub trait Semaphore: Send + Sync {
    /// Consume a unit, blocking until a [`Semaphore::signal`] makes one
    /// available. There is no way to abandon a pending wait.
    fn wait(&self);

    /// Make one unit available, waking at most one blocked waiter. Callable
    /// from any thread, including one that never waited.
    fn signal(&self);

    fn variant(&self) -> Variant;

    /// The current count, read through the guard. Diagnostic only.
    fn value(&self) -> isize;

    /// Releases dropped by this instance's locks because they were already
    /// unlocked. Always zero for a correct variant.
    fn lost_unlocks(&self) -> usize;

    /// Wait now and signal again when the returned permit is dropped.
    #[inline]
    fn permit(&self) -> Permit<'_, Self>
    where
        Self: Sized,
    {
        Permit::acquire(self)
    }

    /// Open the gate once without touching the count, freeing one waiter left
    /// behind by a lost release. Returns false if the variant cannot strand a
    /// waiter and nothing was done.
    #[doc(hidden)]
    #[inline]
    fn release_stranded(&self) -> bool {
        false
    }
}

impl dyn Semaphore {
    /// [`Semaphore::permit`] for a type-erased semaphore.
    #[inline]
    pub fn permit(&self) -> Permit<'_, dyn Semaphore> {
        Permit::acquire(self)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
    DisplayMacro,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    Naive,
    Handoff,
    Turnstile,
    Threshold,
}

impl Variant {
    #[inline]
    pub fn all() -> impl Iterator<Item = Variant> {
        Variant::iter()
    }

    #[inline]
    pub const fn is_correct(self) -> bool {
        !matches!(self, Variant::Naive)
    }

    #[inline]
    pub const fn lock_count(self) -> usize {
        match self {
            Variant::Turnstile => 3,
            Variant::Naive | Variant::Handoff | Variant::Threshold => 2,
        }
    }

    #[inline]
    pub const fn description(self) -> &'static str {
        match self {
            Variant::Naive => {
                "two locks, both released before the waiter claims the gate (loses wake-ups)"
            },
            Variant::Handoff => "two locks, the guard is handed from signaller to the woken waiter",
            Variant::Turnstile => "three locks, a turnstile admits one waiter at a time",
            Variant::Threshold => "two locks, the gate is open exactly while a unit is available",
        }
    }

    #[inline]
    pub fn build(self, initial: isize) -> Result<Arc<dyn Semaphore>, SemaphoreError> {
        self.build_with(initial, None)
    }

    #[inline]
    pub fn build_with(
        self,
        initial: isize,
        jitter: Option<Jitter>,
    ) -> Result<Arc<dyn Semaphore>, SemaphoreError> {
        let semaphore: Arc<dyn Semaphore> = match self {
            Variant::Naive => Arc::new(NaiveSemaphore::with_jitter(initial, jitter)?),
            Variant::Handoff => Arc::new(HandoffSemaphore::with_jitter(initial, jitter)?),
            Variant::Turnstile => Arc::new(TurnstileSemaphore::with_jitter(initial, jitter)?),
            Variant::Threshold => Arc::new(ThresholdSemaphore::with_jitter(initial, jitter)?),
        };
        Ok(semaphore)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemaphoreError {
    #[error("Initial count must not be negative, got {0}")]
    NegativeInitialCount(isize),
}

fn check_initial(initial: isize) -> Result<isize, SemaphoreError> {
    if initial < 0 {
        return Err(SemaphoreError::NegativeInitialCount(initial));
    }
    Ok(initial)
}
