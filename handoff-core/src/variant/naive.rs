use tracing::debug;

use super::{check_initial, Semaphore, SemaphoreError, Variant};
use crate::{
    count::GuardedCount,
    gate::Gate,
    jitter::Jitter,
    lock::UnlockPolicy,
};

/// Two locks, both released by `signal` before the woken waiter has claimed
/// the gate.
///
/// A second `signal` that runs in that window finds the gate already open and
/// its release is lost, so one of two waiters never wakes. The locks are
/// lenient: the lost release is counted and logged instead of asserted, so the
/// defect shows up as a stranded waiter.
pub struct NaiveSemaphore {
    count: GuardedCount,
    gate:  Gate,
}

impl NaiveSemaphore {
    #[inline]
    pub fn new(initial: isize) -> Result<Self, SemaphoreError> {
        Self::with_jitter(initial, None)
    }

    #[inline]
    pub fn with_jitter(initial: isize, jitter: Option<Jitter>) -> Result<Self, SemaphoreError> {
        let initial = check_initial(initial)?;
        Ok(NaiveSemaphore {
            count: GuardedCount::new(initial, UnlockPolicy::Lenient, jitter),
            gate:  Gate::closed(UnlockPolicy::Lenient, jitter),
        })
    }
}

impl Semaphore for NaiveSemaphore {
    #[inline]
    fn wait(&self) {
        self.count.lock();
        if self.count.decrement() < 0 {
            self.count.unlock();
            self.gate.pass();
        } else {
            self.count.unlock();
        }
    }

    #[inline]
    fn signal(&self) {
        self.count.lock();
        let count = self.count.increment();
        if count <= 0 {
            debug!(count, "naive signal opening gate");
            self.gate.open();
        }
        // Both locks are free from here until a waiter passes the gate.
        self.count.unlock();
    }

    #[inline]
    fn variant(&self) -> Variant {
        Variant::Naive
    }

    #[inline]
    fn value(&self) -> isize {
        self.count.snapshot()
    }

    #[inline]
    fn lost_unlocks(&self) -> usize {
        self.count.lost_unlocks() + self.gate.lost_unlocks()
    }

    #[inline]
    fn release_stranded(&self) -> bool {
        debug!("naive gate forced open for a stranded waiter");
        self.gate.open();
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn single_waiter_is_woken() {
        let semaphore = Arc::new(NaiveSemaphore::new(0).expect("valid initial count"));
        let (tx, rx) = crossbeam_channel::bounded(1);

        {
            let semaphore = Arc::clone(&semaphore);
            thread::spawn(move || {
                semaphore.wait();
                tx.send(()).expect("receiver alive");
            });
        }
        semaphore.signal();

        rx.recv_timeout(Duration::from_secs(5)).expect("waiter should wake");
        assert_eq!(semaphore.value(), 0);
        assert_eq!(semaphore.lost_unlocks(), 0);
    }

    #[test]
    fn stranded_waiter_can_be_released() {
        let semaphore = Arc::new(NaiveSemaphore::new(0).expect("valid initial count"));
        let (tx, rx) = crossbeam_channel::bounded(1);

        let waiter = {
            let semaphore = Arc::clone(&semaphore);
            thread::spawn(move || {
                semaphore.wait();
                tx.send(()).expect("receiver alive");
            })
        };
        while semaphore.value() >= 0 {
            thread::yield_now();
        }

        assert!(semaphore.release_stranded());
        rx.recv_timeout(Duration::from_secs(5)).expect("released waiter should return");
        waiter.join().expect("waiter thread should join");
        // The count is left where the stranded wait put it.
        assert_eq!(semaphore.value(), -1);
        assert_eq!(semaphore.lost_unlocks(), 0);
    }
}
