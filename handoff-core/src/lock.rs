use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Condvar,
    Mutex,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, trace, warn};

use crate::jitter::Jitter;

/// What a [`BinaryLock`] does when it is released while already released.
///
/// Either way the release is dropped: binary locks never accumulate unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockPolicy {
    /// Record the lost release and trip a debug assertion.
    Strict,
    /// Record the lost release and log it.
    Lenient,
}

/// A blocking binary lock that is not bound to the thread that locked it.
///
/// Unlike [`std::sync::Mutex`], any thread may call [`BinaryLock::unlock`],
/// which is what lets the semaphores in this crate use a lock as a plain
/// signal and hand a held lock from one thread to another.
pub struct BinaryLock {
    name:         &'static str,
    locked:       Mutex<bool>,
    condvar:      Condvar,
    lost_unlocks: AtomicUsize,
    policy:       UnlockPolicy,
    jitter:       Option<Jitter>,
}

impl BinaryLock {
    #[inline]
    pub fn new(name: &'static str, locked: bool, policy: UnlockPolicy) -> Self {
        BinaryLock {
            name,
            locked: Mutex::new(locked),
            condvar: Condvar::new(),
            lost_unlocks: AtomicUsize::new(0),
            policy,
            jitter: None,
        }
    }

    /// Perturb scheduling around every acquire and release of this lock.
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: Option<Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Block until the lock is free, then take it.
    #[inline]
    pub fn lock(&self) {
        self.perturb();
        let mut locked = self.locked.lock().expect("Mutex poisoned");
        while *locked {
            locked = self.condvar.wait(locked).expect("Condvar poisoned");
        }
        *locked = true;
        drop(locked);
        trace!(lock = self.name, "acquired");
    }

    /// Take the lock if it is free. Never blocks on the lock's state.
    #[cfg(test)]
    fn try_lock(&self) -> bool {
        let mut locked = self.locked.lock().expect("Mutex poisoned");
        if *locked {
            return false;
        }
        *locked = true;
        true
    }

    /// Release the lock and wake at most one blocked acquirer.
    ///
    /// Releasing a lock that is already free does nothing except record the
    /// lost release, which is reported through [`BinaryLock::lost_unlocks`]
    /// and the returned error.
    #[inline]
    pub fn unlock(&self) -> Result<(), LockError> {
        let mut locked = self.locked.lock().expect("Mutex poisoned");
        if !*locked {
            drop(locked);
            return Err(self.record_lost_unlock());
        }
        *locked = false;
        drop(locked);
        self.condvar.notify_one();
        trace!(lock = self.name, "released");
        self.perturb();
        Ok(())
    }

    /// Number of releases dropped because the lock was already free.
    #[inline]
    pub fn lost_unlocks(&self) -> usize {
        self.lost_unlocks.load(Ordering::SeqCst)
    }

    fn record_lost_unlock(&self) -> LockError {
        let total = self.lost_unlocks.fetch_add(1, Ordering::SeqCst) + 1;
        let err = LockError::AlreadyUnlocked {
            lock: self.name,
        };
        match self.policy {
            UnlockPolicy::Strict => error!(lock = self.name, total, "{}", err),
            UnlockPolicy::Lenient => warn!(lock = self.name, total, "{}", err),
        }
        debug_assert!(self.policy == UnlockPolicy::Lenient, "{}", err);
        err
    }

    fn perturb(&self) {
        if let Some(jitter) = &self.jitter {
            jitter.perturb();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("Lost release: the {lock} lock was already unlocked")]
    AlreadyUnlocked { lock: &'static str },
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn lock_unlock_uncontended() {
        let lock = BinaryLock::new("test", false, UnlockPolicy::Strict);
        lock.lock();
        assert!(!lock.try_lock());
        lock.unlock().expect("lock was held");
        assert!(lock.try_lock());
        lock.unlock().expect("lock was held");
        assert_eq!(lock.lost_unlocks(), 0);
    }

    #[test]
    fn starts_locked() {
        let lock = BinaryLock::new("test", true, UnlockPolicy::Strict);
        assert!(!lock.try_lock());
        lock.unlock().expect("lock started held");
        assert!(lock.try_lock());
    }

    #[test]
    fn unlock_while_unlocked_is_lost() {
        let lock = BinaryLock::new("gate", true, UnlockPolicy::Lenient);
        lock.unlock().expect("lock started held");
        assert_eq!(
            lock.unlock(),
            Err(LockError::AlreadyUnlocked {
                lock: "gate"
            })
        );
        assert_eq!(lock.lost_unlocks(), 1);

        // Two releases only buy a single acquire.
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Lost release")]
    fn strict_unlock_while_unlocked_asserts() {
        let lock = BinaryLock::new("guard", false, UnlockPolicy::Strict);
        let _ = lock.unlock();
    }

    #[test]
    fn unlock_from_another_thread_wakes_blocked_locker() {
        let lock = Arc::new(BinaryLock::new("gate", true, UnlockPolicy::Strict));
        let (tx, rx) = crossbeam_channel::bounded(1);

        let blocked = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.lock();
                tx.send(()).expect("receiver alive");
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        lock.unlock().expect("lock started held");
        rx.recv_timeout(Duration::from_secs(5)).expect("blocked locker should wake");
        blocked.join().expect("locker thread should join");
        assert!(!lock.try_lock());
    }

    #[test]
    fn jittered_lock_still_excludes() {
        let lock = Arc::new(
            BinaryLock::new("guard", false, UnlockPolicy::Strict)
                .with_jitter(Some(Jitter::default())),
        );
        let inside = Arc::new(AtomicUsize::new(0));

        thread::scope(|s| {
            for _ in 0..4 {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                s.spawn(move || {
                    for _ in 0..200 {
                        lock.lock();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        lock.unlock().expect("lock was held");
                    }
                });
            }
        });

        assert_eq!(lock.lost_unlocks(), 0);
    }
}
