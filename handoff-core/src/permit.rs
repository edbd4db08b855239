use crate::variant::Semaphore;

/// RAII guard that signals its semaphore when dropped.
#[must_use = "dropping this permit signals the semaphore immediately"]
pub struct Permit<'a, S: Semaphore + ?Sized> {
    semaphore: &'a S,
}

impl<'a, S: Semaphore + ?Sized> Permit<'a, S> {
    /// Wait on `semaphore` and hold the unit until the permit is dropped.
    #[inline]
    pub fn acquire(semaphore: &'a S) -> Self {
        semaphore.wait();
        Self {
            semaphore,
        }
    }

    /// Keep the unit: the semaphore is not signalled.
    #[inline]
    pub fn forget(self) {
        let _ = std::mem::ManuallyDrop::new(self);
    }
}

impl<S: Semaphore + ?Sized> Drop for Permit<'_, S> {
    #[inline]
    fn drop(&mut self) {
        self.semaphore.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{HandoffSemaphore, Variant};

    #[test]
    fn permit_signals_on_drop() {
        let semaphore = HandoffSemaphore::new(1).expect("valid initial count");
        {
            let _permit = Permit::acquire(&semaphore);
            assert_eq!(semaphore.value(), 0);
        }
        assert_eq!(semaphore.value(), 1);
    }

    #[test]
    fn permit_through_the_semaphore() {
        let semaphore = HandoffSemaphore::new(2).expect("valid initial count");
        {
            let _first = semaphore.permit();
            let _second = semaphore.permit();
            assert_eq!(semaphore.value(), 0);
        }
        assert_eq!(semaphore.value(), 2);

        let semaphore = Variant::Turnstile.build(1).expect("valid initial count");
        {
            let _permit = Permit::acquire(&*semaphore);
            assert_eq!(semaphore.value(), 0);
        }
        assert_eq!(semaphore.value(), 1);
        assert_eq!(semaphore.lost_unlocks(), 0);
    }

    #[test]
    fn forgotten_permit_keeps_the_unit() {
        let semaphore = Variant::Threshold.build(1).expect("valid initial count");
        Permit::acquire(&*semaphore).forget();
        assert_eq!(semaphore.value(), 0);
    }
}
