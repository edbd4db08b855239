use super::{check_initial, Semaphore, SemaphoreError, Variant};
use crate::{
    count::GuardedCount,
    gate::Gate,
    jitter::Jitter,
    lock::UnlockPolicy,
};

/// Two locks, with the guard handed from the signaller to the woken waiter.
///
/// When `signal` opens the gate it keeps `guard` locked. The waiter that
/// passes the gate closes it again by passing and only then releases `guard`.
/// Between the gate opening and the waiter passing, `guard` stays locked, so
/// no second `signal` can open the gate a second time.
pub struct HandoffSemaphore {
    count: GuardedCount,
    gate:  Gate,
}

impl HandoffSemaphore {
    #[inline]
    pub fn new(initial: isize) -> Result<Self, SemaphoreError> {
        Self::with_jitter(initial, None)
    }

    #[inline]
    pub fn with_jitter(initial: isize, jitter: Option<Jitter>) -> Result<Self, SemaphoreError> {
        let initial = check_initial(initial)?;
        Ok(HandoffSemaphore {
            count: GuardedCount::new(initial, UnlockPolicy::Strict, jitter),
            gate:  Gate::closed(UnlockPolicy::Strict, jitter),
        })
    }
}

impl Semaphore for HandoffSemaphore {
    #[inline]
    fn wait(&self) {
        self.count.lock();
        if self.count.decrement() < 0 {
            self.count.unlock();
            self.gate.pass();
            // The signaller that opened the gate left the guard locked for us.
        }
        self.count.unlock();
    }

    #[inline]
    fn signal(&self) {
        self.count.lock();
        if self.count.increment() <= 0 {
            // The guard now belongs to the waiter that passes the gate.
            self.gate.open();
        } else {
            self.count.unlock();
        }
    }

    #[inline]
    fn variant(&self) -> Variant {
        Variant::Handoff
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
    fn guard_is_released_by_the_woken_waiter() {
        let semaphore = Arc::new(HandoffSemaphore::new(0).expect("valid initial count"));
        let (tx, rx) = crossbeam_channel::bounded(1);

        {
            let semaphore = Arc::clone(&semaphore);
            thread::spawn(move || {
                semaphore.wait();
                tx.send(()).expect("receiver alive");
            });
        }

        // Once the waiter is blocked the count is negative.
        while semaphore.value() >= 0 {
            thread::yield_now();
        }
        semaphore.signal();
        rx.recv_timeout(Duration::from_secs(5)).expect("waiter should wake");

        // Reading the value takes the guard, so the waiter must have released it.
        assert_eq!(semaphore.value(), 0);
        assert_eq!(semaphore.lost_unlocks(), 0);
    }

    #[test]
    fn back_to_back_signals_wake_two_waiters() {
        let semaphore = Arc::new(HandoffSemaphore::new(0).expect("valid initial count"));
        let (tx, rx) = crossbeam_channel::unbounded();

        for _ in 0..2 {
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            thread::spawn(move || {
                semaphore.wait();
                tx.send(()).expect("receiver alive");
            });
        }
        while semaphore.value() > -2 {
            thread::yield_now();
        }
        semaphore.signal();
        semaphore.signal();

        for _ in 0..2 {
            rx.recv_timeout(Duration::from_secs(5)).expect("both waiters should wake");
        }
        assert_eq!(semaphore.lost_unlocks(), 0);
    }
}
