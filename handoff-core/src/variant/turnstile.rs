use super::{check_initial, Semaphore, SemaphoreError, Variant};
use crate::{
    count::GuardedCount,
    gate::{Gate, Turnstile},
    jitter::Jitter,
    lock::UnlockPolicy,
};

/// Three locks: a turnstile around the whole of `wait`.
///
/// Only one thread is ever inside `wait`, so at most one waiter is blocked on
/// the gate and the count never drops below -1. A second `signal` cannot find
/// the count at or below zero until that waiter has passed the gate and left.
///
/// Lock order is turnstile, guard, gate.
pub struct TurnstileSemaphore {
    turnstile: Turnstile,
    count:     GuardedCount,
    gate:      Gate,
}

impl TurnstileSemaphore {
    #[inline]
    pub fn new(initial: isize) -> Result<Self, SemaphoreError> {
        Self::with_jitter(initial, None)
    }

    #[inline]
    pub fn with_jitter(initial: isize, jitter: Option<Jitter>) -> Result<Self, SemaphoreError> {
        let initial = check_initial(initial)?;
        Ok(TurnstileSemaphore {
            turnstile: Turnstile::new(UnlockPolicy::Strict, jitter),
            count:     GuardedCount::new(initial, UnlockPolicy::Strict, jitter),
            gate:      Gate::closed(UnlockPolicy::Strict, jitter),
        })
    }
}

impl Semaphore for TurnstileSemaphore {
    #[inline]
    fn wait(&self) {
        self.turnstile.enter();
        self.count.lock();
        if self.count.decrement() < 0 {
            self.count.unlock();
            self.gate.pass();
        } else {
            self.count.unlock();
        }
        self.turnstile.exit();
    }

    #[inline]
    fn signal(&self) {
        self.count.lock();
        if self.count.increment() <= 0 {
            self.gate.open();
        }
        self.count.unlock();
    }

    #[inline]
    fn variant(&self) -> Variant {
        Variant::Turnstile
    }

    #[inline]
    fn value(&self) -> isize {
        self.count.snapshot()
    }

    #[inline]
    fn lost_unlocks(&self) -> usize {
        self.turnstile.lost_unlocks() + self.count.lost_unlocks() + self.gate.lost_unlocks()
    }
}
