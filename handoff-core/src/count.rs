use std::sync::atomic::{AtomicIsize, Ordering};

use crate::{
    jitter::Jitter,
    lock::{BinaryLock, UnlockPolicy},
};

/// A signed count and the `guard` lock that protects it.
///
/// [`GuardedCount::increment`] and [`GuardedCount::decrement`] must only be
/// called while the guard is held. The guard may be released by a different
/// thread than the one that took it.
pub struct GuardedCount {
    guard: BinaryLock,
    // Only read or written while `guard` is held.
    count: AtomicIsize,
}

impl GuardedCount {
    #[inline]
    pub fn new(initial: isize, policy: UnlockPolicy, jitter: Option<Jitter>) -> Self {
        GuardedCount {
            guard: BinaryLock::new("guard", false, policy).with_jitter(jitter),
            count: AtomicIsize::new(initial),
        }
    }

    #[inline]
    pub fn lock(&self) {
        self.guard.lock();
    }

    #[inline]
    pub fn unlock(&self) {
        // The lock records and reports a lost release itself.
        let _ = self.guard.unlock();
    }

    /// Decrement under the guard and return the new value.
    #[inline]
    pub fn decrement(&self) -> isize {
        self.count.fetch_sub(1, Ordering::Relaxed) - 1
    }

    /// Increment under the guard and return the new value.
    #[inline]
    pub fn increment(&self) -> isize {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Read the count through the guard. Blocks while the guard is held,
    /// including during a handoff.
    #[inline]
    pub fn snapshot(&self) -> isize {
        self.lock();
        let value = self.count.load(Ordering::Relaxed);
        self.unlock();
        value
    }

    #[inline]
    pub fn lost_unlocks(&self) -> usize {
        self.guard.lost_unlocks()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn increment_and_decrement_return_new_value() {
        let count = GuardedCount::new(0, UnlockPolicy::Strict, None);
        count.lock();
        assert_eq!(count.decrement(), -1);
        assert_eq!(count.decrement(), -2);
        assert_eq!(count.increment(), -1);
        count.unlock();
        assert_eq!(count.snapshot(), -1);
    }

    #[test]
    fn guarded_updates_are_not_lost() {
        let count = Arc::new(GuardedCount::new(0, UnlockPolicy::Strict, None));

        thread::scope(|s| {
            for _ in 0..8 {
                let count = Arc::clone(&count);
                s.spawn(move || {
                    for _ in 0..500 {
                        count.lock();
                        count.increment();
                        count.unlock();
                    }
                });
            }
        });

        assert_eq!(count.snapshot(), 4000);
        assert_eq!(count.lost_unlocks(), 0);
    }
}
