//! Counting semaphores built out of binary locks.
//!
//! The semaphores here have nothing but a signed count and two or three
//! [`lock::BinaryLock`]s. One lock guards the count, one is used purely as a
//! gate that blocked waiters queue on, and one variant adds a turnstile. How a
//! released unit is handed to a blocked waiter is what separates the
//! [`variant::NaiveSemaphore`], which can lose a wake-up and strand a waiter
//! forever, from the three correct constructions.
//!
//! [`stress`] and [`scenario`] drive the variants through the interleavings
//! that tell them apart.
//!
//! ```
//! use handoff_core::{Semaphore, Variant};
//!
//! let semaphore = Variant::Handoff.build(0).expect("valid initial count");
//! semaphore.signal();
//! semaphore.wait();
//! assert_eq!(semaphore.value(), 0);
//! ```

pub mod count;
pub mod gate;
pub mod jitter;
pub mod lock;
pub mod permit;
pub mod scenario;
pub mod stress;
pub mod variant;

pub use jitter::Jitter;
pub use lock::{BinaryLock, LockError, UnlockPolicy};
pub use permit::Permit;
pub use scenario::{Scenario, ScenarioError, ScenarioOutcome};
pub use stress::{run_stress, StressConfig, StressError, StressProgress, StressReport};
pub use variant::{
    HandoffSemaphore,
    NaiveSemaphore,
    Semaphore,
    SemaphoreError,
    ThresholdSemaphore,
    TurnstileSemaphore,
    Variant,
};
