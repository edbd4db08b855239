//! Lock roles that carry no data.
//!
//! A [`Gate`] is a binary lock used as a signal: it is closed while nobody may
//! proceed and opening it lets exactly one blocked thread through. A
//! [`Turnstile`] serializes entry into a code path. Both are built on
//! [`BinaryLock`] but are kept as separate types from the lock that protects
//! the count, so the two uses cannot be mixed up.

use crate::{
    jitter::Jitter,
    lock::{BinaryLock, UnlockPolicy},
};

pub struct Gate {
    lock: BinaryLock,
}

impl Gate {
    #[inline]
    pub fn new(open: bool, policy: UnlockPolicy, jitter: Option<Jitter>) -> Self {
        Gate {
            lock: BinaryLock::new("gate", !open, policy).with_jitter(jitter),
        }
    }

    #[inline]
    pub fn closed(policy: UnlockPolicy, jitter: Option<Jitter>) -> Self {
        Self::new(false, policy, jitter)
    }

    /// Block until the gate is open and close it again behind the caller.
    #[inline]
    pub fn pass(&self) {
        self.lock.lock();
    }

    /// Let one blocked (or the next) caller of [`Gate::pass`] through.
    ///
    /// Opening an open gate is lost, not queued.
    #[inline]
    pub fn open(&self) {
        // The lock records and reports a lost release itself.
        let _ = self.lock.unlock();
    }

    #[inline]
    pub fn lost_unlocks(&self) -> usize {
        self.lock.lost_unlocks()
    }
}

pub struct Turnstile {
    lock: BinaryLock,
}

impl Turnstile {
    #[inline]
    pub fn new(policy: UnlockPolicy, jitter: Option<Jitter>) -> Self {
        Turnstile {
            lock: BinaryLock::new("turnstile", false, policy).with_jitter(jitter),
        }
    }

    #[inline]
    pub fn enter(&self) {
        self.lock.lock();
    }

    #[inline]
    pub fn exit(&self) {
        let _ = self.lock.unlock();
    }

    #[inline]
    pub fn lost_unlocks(&self) -> usize {
        self.lock.lost_unlocks()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn closed_gate_blocks_until_opened() {
        let gate = Arc::new(Gate::closed(UnlockPolicy::Strict, None));
        let (tx, rx) = crossbeam_channel::bounded(1);

        let passer = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.pass();
                tx.send(()).expect("receiver alive");
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        gate.open();
        rx.recv_timeout(Duration::from_secs(5)).expect("passer should get through");
        passer.join().expect("passer thread should join");
        assert_eq!(gate.lost_unlocks(), 0);
    }

    #[test]
    fn open_gate_lets_one_through() {
        let gate = Gate::new(true, UnlockPolicy::Strict, None);
        gate.pass();
        // Closed behind the first passer, so reopen before passing again.
        gate.open();
        gate.pass();
    }

    #[test]
    fn opening_twice_loses_a_release() {
        let gate = Gate::closed(UnlockPolicy::Lenient, None);
        gate.open();
        gate.open();
        assert_eq!(gate.lost_unlocks(), 1);
    }

    #[test]
    fn turnstile_round_trip() {
        let turnstile = Turnstile::new(UnlockPolicy::Strict, None);
        turnstile.enter();
        turnstile.exit();
        turnstile.enter();
        turnstile.exit();
        assert_eq!(turnstile.lost_unlocks(), 0);
    }
}
