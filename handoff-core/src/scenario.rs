use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use strum::{Display as DisplayMacro, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use thiserror::Error;
use tracing::debug;

use crate::{
    jitter::Jitter,
    stress::{run_iteration, StressConfig, StressError},
    variant::{Semaphore, SemaphoreError, Variant},
};

const CONTENTION_INITIAL: usize = 4;
const CONTENTION_WAITERS: usize = 4;
const CONTENTION_WAITS_EACH: usize = 250;
const CONTENTION_SIGNALLERS: usize = 4;

/// Named interleavings with a known expected result.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
    DisplayMacro,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    PingPong,
    Accumulate,
    HandoffPair,
    Contention,
}

impl Scenario {
    #[inline]
    pub fn all() -> impl Iterator<Item = Scenario> {
        Scenario::iter()
    }

    #[inline]
    pub const fn description(self) -> &'static str {
        match self {
            Scenario::PingPong => {
                "one thread waits, another signals, then signal and wait on the same thread"
            },
            Scenario::Accumulate => "three signals with no waiters, then three waits",
            Scenario::HandoffPair => "two waiters, two signals from a third thread",
            Scenario::Contention => {
                "several waiters and signallers, checking no unit is consumed twice"
            },
        }
    }

    #[inline]
    pub fn run(
        self,
        variant: Variant,
        timeout: Duration,
    ) -> Result<ScenarioOutcome, ScenarioError> {
        debug!("Running scenario {} against {}", self, variant);
        let detail = match self {
            Scenario::PingPong => ping_pong(variant, timeout)?,
            Scenario::Accumulate => accumulate(variant, timeout)?,
            Scenario::HandoffPair => handoff_pair(variant, timeout)?,
            Scenario::Contention => contention(variant, timeout)?,
        };
        Ok(ScenarioOutcome {
            scenario: self,
            variant,
            detail,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub variant:  Variant,
    pub detail:   String,
}

fn ping_pong(variant: Variant, timeout: Duration) -> Result<String, ScenarioError> {
    let semaphore = variant.build(0)?;
    let (tx, rx) = crossbeam_channel::bounded(1);

    {
        let semaphore = Arc::clone(&semaphore);
        thread::Builder::new().name("ping".to_owned()).spawn(move || {
            semaphore.wait();
            let _ = tx.send(());
        })?;
    }
    {
        let semaphore = Arc::clone(&semaphore);
        thread::Builder::new().name("pong".to_owned()).spawn(move || semaphore.signal())?;
    }
    rx.recv_timeout(timeout).map_err(|_| ScenarioError::TimedOut {
        step:       "wait released by another thread's signal",
        timeout_ms: millis(timeout),
    })?;

    {
        let semaphore = Arc::clone(&semaphore);
        within(timeout, "signal then wait on one thread", move || {
            semaphore.signal();
            semaphore.wait();
        })?;
    }

    expect_settled(&*semaphore, 0)?;
    Ok("cross-thread wake and same-thread signal/wait both returned".to_owned())
}

fn accumulate(variant: Variant, timeout: Duration) -> Result<String, ScenarioError> {
    let semaphore = variant.build(0)?;
    for _ in 0..3 {
        semaphore.signal();
    }
    expect_value(&*semaphore, 3)?;

    {
        let semaphore = Arc::clone(&semaphore);
        within(timeout, "three waits after three signals", move || {
            for _ in 0..3 {
                semaphore.wait();
            }
        })?;
    }

    expect_settled(&*semaphore, 0)?;
    Ok("three signals were banked and redeemed by three waits".to_owned())
}

fn handoff_pair(variant: Variant, timeout: Duration) -> Result<String, ScenarioError> {
    let config = StressConfig {
        iterations: 1,
        timeout_ms: millis(timeout),
        jitter: Jitter::none(),
        ..StressConfig::default()
    };
    let outcome = run_iteration(variant, &config)?;
    if outcome.hung() {
        return Err(ScenarioError::TimedOut {
            step:       "second waiter of the pair",
            timeout_ms: config.timeout_ms,
        });
    }
    if outcome.lost_unlocks != 0 {
        return Err(ScenarioError::LostUnlocks(outcome.lost_unlocks));
    }
    Ok(format!("both waiters returned ({} of {})", outcome.returned, config.waiters))
}

fn contention(variant: Variant, timeout: Duration) -> Result<String, ScenarioError> {
    let total_waits = CONTENTION_WAITERS * CONTENTION_WAITS_EACH;
    let total_signals = total_waits - CONTENTION_INITIAL;
    let semaphore = variant.build_with(to_isize(CONTENTION_INITIAL), Some(Jitter::default()))?;
    let signalled = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));
    let double_consumed = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<()>();

    for waiter in 0..CONTENTION_WAITERS {
        let semaphore = Arc::clone(&semaphore);
        let signalled = Arc::clone(&signalled);
        let released = Arc::clone(&released);
        let double_consumed = Arc::clone(&double_consumed);
        let done_tx = done_tx.clone();
        thread::Builder::new().name(format!("contention-waiter-{waiter}")).spawn(move || {
            for _ in 0..CONTENTION_WAITS_EACH {
                semaphore.wait();
                let released = released.fetch_add(1, Ordering::SeqCst) + 1;
                if released > CONTENTION_INITIAL + signalled.load(Ordering::SeqCst) {
                    double_consumed.store(true, Ordering::SeqCst);
                }
            }
            let _ = done_tx.send(());
        })?;
    }

    for signaller in 0..CONTENTION_SIGNALLERS {
        let semaphore = Arc::clone(&semaphore);
        let signalled = Arc::clone(&signalled);
        let done_tx = done_tx.clone();
        let share = total_signals / CONTENTION_SIGNALLERS
            + usize::from(signaller < total_signals % CONTENTION_SIGNALLERS);
        thread::Builder::new().name(format!("contention-signaller-{signaller}")).spawn(
            move || {
                for _ in 0..share {
                    signalled.fetch_add(1, Ordering::SeqCst);
                    semaphore.signal();
                }
                let _ = done_tx.send(());
            },
        )?;
    }
    drop(done_tx);

    let deadline = Instant::now() + timeout;
    for _ in 0..CONTENTION_WAITERS + CONTENTION_SIGNALLERS {
        done_rx.recv_deadline(deadline).map_err(|_| ScenarioError::TimedOut {
            step:       "contended waits and signals",
            timeout_ms: millis(timeout),
        })?;
    }

    let released = released.load(Ordering::SeqCst);
    let available = CONTENTION_INITIAL + signalled.load(Ordering::SeqCst);
    if double_consumed.load(Ordering::SeqCst) || released > available {
        return Err(ScenarioError::DoubleConsumption {
            released,
            available,
        });
    }
    expect_settled(&*semaphore, 0)?;
    Ok(format!(
        "{} waits matched {} signals plus {} initial units",
        released, total_signals, CONTENTION_INITIAL
    ))
}

/// Run `f` on its own thread and fail if it has not returned within `timeout`.
/// On timeout the thread is left blocked.
fn within<F>(timeout: Duration, step: &'static str, f: F) -> Result<(), ScenarioError>
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::Builder::new().name("scenario-step".to_owned()).spawn(move || {
        f();
        let _ = tx.send(());
    })?;
    rx.recv_timeout(timeout).map_err(|_| ScenarioError::TimedOut {
        step,
        timeout_ms: millis(timeout),
    })
}

fn expect_value(semaphore: &dyn Semaphore, expected: isize) -> Result<(), ScenarioError> {
    let actual = semaphore.value();
    if actual != expected {
        return Err(ScenarioError::ValueMismatch {
            expected,
            actual,
        });
    }
    Ok(())
}

fn expect_settled(semaphore: &dyn Semaphore, expected: isize) -> Result<(), ScenarioError> {
    expect_value(semaphore, expected)?;
    match semaphore.lost_unlocks() {
        0 => Ok(()),
        lost => Err(ScenarioError::LostUnlocks(lost)),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn to_isize(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Timed out after {timeout_ms}ms waiting for: {step}")]
    TimedOut {
        step:       &'static str,
        timeout_ms: u64,
    },
    #[error("{released} waits returned but only {available} units were ever available")]
    DoubleConsumption {
        released:  usize,
        available: usize,
    },
    #[error("Expected a final count of {expected}, found {actual}")]
    ValueMismatch {
        expected: isize,
        actual:   isize,
    },
    #[error("{0} releases were lost on already-unlocked locks")]
    LostUnlocks(usize),
    #[error(transparent)]
    Semaphore(#[from] SemaphoreError),
    #[error(transparent)]
    Stress(#[from] StressError),
    #[error("Failed to spawn a scenario thread: {0}")]
    Spawn(#[from] io::Error),
}
