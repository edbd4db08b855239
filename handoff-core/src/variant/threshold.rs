use super::{check_initial, Semaphore, SemaphoreError, Variant};
use crate::{
    count::GuardedCount,
    gate::Gate,
    jitter::Jitter,
    lock::UnlockPolicy,
};

/// Two locks, with the gate open exactly while a unit is available.
///
/// Every `wait` passes the gate before touching the count and reopens it only
/// if units remain. `signal` reopens it only on the transition from zero to
/// one unit. The count therefore never goes negative, and waiters beyond the
/// available units block on the gate rather than after their decrement.
pub struct ThresholdSemaphore {
    count: GuardedCount,
    gate:  Gate,
}

impl ThresholdSemaphore {
    #[inline]
    pub fn new(initial: isize) -> Result<Self, SemaphoreError> {
        Self::with_jitter(initial, None)
    }

    #[inline]
    pub fn with_jitter(initial: isize, jitter: Option<Jitter>) -> Result<Self, SemaphoreError> {
        let initial = check_initial(initial)?;
        Ok(ThresholdSemaphore {
            count: GuardedCount::new(initial, UnlockPolicy::Strict, jitter),
            gate:  Gate::new(initial > 0, UnlockPolicy::Strict, jitter),
        })
    }
}

impl Semaphore for ThresholdSemaphore {
    #[inline]
    fn wait(&self) {
        self.gate.pass();
        self.count.lock();
        if self.count.decrement() > 0 {
            self.gate.open();
        }
        self.count.unlock();
    }

    #[inline]
    fn signal(&self) {
        self.count.lock();
        if self.count.increment() == 1 {
            self.gate.open();
        }
        self.count.unlock();
    }

    #[inline]
    fn variant(&self) -> Variant {
        Variant::Threshold
    }

    #[inline]
    fn value(&self) -> isize {
        self.count.snapshot()
    }

    #[inline]
    fn lost_unlocks(&self) -> usize {
        self.count.lost_unlocks() + self.gate.lost_unlocks()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn count_never_goes_negative() {
        let semaphore = Arc::new(ThresholdSemaphore::new(0).expect("valid initial count"));
        let (tx, rx) = crossbeam_channel::unbounded();

        for _ in 0..3 {
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            thread::spawn(move || {
                semaphore.wait();
                tx.send(()).expect("receiver alive");
            });
        }

        // Waiters block on the closed gate before they reach the count.
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
        assert_eq!(semaphore.value(), 0);

        for _ in 0..3 {
            semaphore.signal();
        }
        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(5)).expect("every waiter should wake");
        }
        assert_eq!(semaphore.value(), 0);
        assert_eq!(semaphore.lost_unlocks(), 0);
    }

    #[test]
    fn positive_initial_count_starts_open() {
        let semaphore = ThresholdSemaphore::new(2).expect("valid initial count");
        semaphore.wait();
        semaphore.wait();
        assert_eq!(semaphore.value(), 0);
        semaphore.signal();
        semaphore.wait();
        assert_eq!(semaphore.lost_unlocks(), 0);
    }
}
