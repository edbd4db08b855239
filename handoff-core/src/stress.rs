//! Repeated interleaving runs that separate the correct variants from the
//! naive one.
//!
//! Each iteration builds a fresh semaphore, starts `waiters` threads that each
//! call `wait()`, lets them settle into the blocking path, and then starts one
//! signaller thread that calls `signal()` once per waiter. A waiter that has
//! not returned within the timeout is counted as stranded. Once the iteration
//! has been scored, stranded waiters are freed by forcing the gate open and
//! every waiter thread is joined. A waiter that cannot be freed is left
//! behind and reported as leaked. A run stops early once `stop_after_hangs`
//! iterations have hung.

use std::{
    io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::{
    jitter::{Jitter, JitterError},
    variant::{Semaphore, SemaphoreError, Variant},
};

pub const DEFAULT_ITERATIONS: usize = 100_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_SETTLE_MICROS: u64 = 200;
pub const DEFAULT_WAITERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub iterations:       usize,
    /// How long every waiter of one iteration gets to return.
    pub timeout_ms:       u64,
    /// Pause between starting the waiters and starting the signaller.
    pub settle_micros:    u64,
    pub initial:          isize,
    pub waiters:          usize,
    pub jitter:           Jitter,
    /// Stop after this many hung iterations. Zero runs every iteration.
    pub stop_after_hangs: usize,
}

impl Default for StressConfig {
    #[inline]
    fn default() -> Self {
        Self {
            iterations:       DEFAULT_ITERATIONS,
            timeout_ms:       DEFAULT_TIMEOUT_MS,
            settle_micros:    DEFAULT_SETTLE_MICROS,
            initial:          0,
            waiters:          DEFAULT_WAITERS,
            jitter:           Jitter::default(),
            stop_after_hangs: 1,
        }
    }
}

impl StressConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), StressError> {
        if self.iterations == 0 {
            return Err(StressError::NoIterations);
        }
        if self.waiters == 0 {
            return Err(StressError::NoWaiters);
        }
        if self.timeout_ms == 0 {
            return Err(StressError::NoTimeout);
        }
        if self.initial < 0 {
            return Err(SemaphoreError::NegativeInitialCount(self.initial).into());
        }
        self.jitter.validate()?;
        Ok(())
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[inline]
    pub fn settle(&self) -> Duration {
        Duration::from_micros(self.settle_micros)
    }

    fn active_jitter(&self) -> Option<Jitter> {
        self.jitter.is_active().then_some(self.jitter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressProgress {
    pub variant:   Variant,
    pub iteration: usize,
    pub total:     usize,
    pub hangs:     usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressReport {
    pub variant:              Variant,
    pub iterations_run:       usize,
    pub hangs:                usize,
    pub stranded_waiters:     usize,
    pub first_hang_iteration: Option<usize>,
    /// Stranded waiters that could not be freed and are still blocked.
    pub leaked_waiters:       usize,
    pub lost_unlocks:         usize,
    pub elapsed_ms:           u64,
}

impl StressReport {
    #[inline]
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            iterations_run: 0,
            hangs: 0,
            stranded_waiters: 0,
            first_hang_iteration: None,
            leaked_waiters: 0,
            lost_unlocks: 0,
            elapsed_ms: 0,
        }
    }

    /// No iteration hung and no lock lost a release.
    #[inline]
    pub fn passed(&self) -> bool {
        self.hangs == 0 && self.lost_unlocks == 0
    }

    /// Whether the report matches what the variant is known to do: correct
    /// variants pass, the naive one fails.
    #[inline]
    pub fn as_expected(&self) -> bool {
        self.passed() == self.variant.is_correct()
    }
}

/// The result of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationOutcome {
    pub returned:     usize,
    pub stranded:     usize,
    /// Stranded waiters freed after the timeout.
    pub recovered:    usize,
    pub lost_unlocks: usize,
}

impl IterationOutcome {
    #[inline]
    pub fn hung(&self) -> bool {
        self.stranded > 0
    }

    #[inline]
    pub fn leaked(&self) -> usize {
        self.stranded - self.recovered
    }
}

#[inline]
pub fn run_stress<F>(
    variant: Variant,
    config: &StressConfig,
    mut on_progress: F,
) -> Result<StressReport, StressError>
where
    F: FnMut(StressProgress),
{
    config.validate()?;
    info!(
        "Stressing {} for {} iterations ({} waiters, {}ms timeout)",
        variant, config.iterations, config.waiters, config.timeout_ms
    );

    let started = Instant::now();
    let progress_every = (config.iterations / 20).max(1);
    let mut report = StressReport::new(variant);

    for iteration in 0..config.iterations {
        let outcome = run_iteration(variant, config)?;
        report.iterations_run += 1;
        report.lost_unlocks += outcome.lost_unlocks;
        if outcome.hung() {
            report.hangs += 1;
            report.stranded_waiters += outcome.stranded;
            report.leaked_waiters += outcome.leaked();
            report.first_hang_iteration.get_or_insert(iteration);
            debug!(
                "{} iteration {} stranded {} of {} waiters ({} lost releases)",
                variant, iteration, outcome.stranded, config.waiters, outcome.lost_unlocks
            );
        }

        if (iteration + 1) % progress_every == 0 {
            on_progress(StressProgress {
                variant,
                iteration: iteration + 1,
                total: config.iterations,
                hangs: report.hangs,
            });
        }

        if config.stop_after_hangs != 0 && report.hangs >= config.stop_after_hangs {
            info!(
                "Stopping {} after {} hung iterations",
                variant, report.hangs
            );
            break;
        }
    }

    report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        "{}: {} iterations, {} hung, {} lost releases in {}ms",
        variant, report.iterations_run, report.hangs, report.lost_unlocks, report.elapsed_ms
    );
    Ok(report)
}

/// Run a single iteration: `config.waiters` waiters against as many signals
/// from one separate thread.
#[inline]
pub fn run_iteration(
    variant: Variant,
    config: &StressConfig,
) -> Result<IterationOutcome, StressError> {
    let semaphore = variant.build_with(config.initial, config.active_jitter())?;
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<usize>();

    let mut waiters = Vec::with_capacity(config.waiters);
    for waiter in 0..config.waiters {
        let semaphore = Arc::clone(&semaphore);
        let done_tx = done_tx.clone();
        waiters.push(thread::Builder::new().name(format!("waiter-{waiter}")).spawn(
            move || {
                semaphore.wait();
                let _ = done_tx.send(waiter);
            },
        )?);
    }
    drop(done_tx);

    if !config.settle().is_zero() {
        thread::sleep(config.settle());
    }

    let signaller = {
        let semaphore = Arc::clone(&semaphore);
        let signals = config.waiters;
        thread::Builder::new().name("signaller".to_owned()).spawn(move || {
            for _ in 0..signals {
                semaphore.signal();
            }
        })?
    };

    let deadline = Instant::now() + config.timeout();
    let mut returned = 0;
    while returned < config.waiters {
        match done_rx.recv_deadline(deadline) {
            Ok(waiter) => {
                trace!("waiter {} returned", waiter);
                returned += 1;
            },
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }

    signaller.join().map_err(|_| StressError::SignallerPanicked)?;

    // Scored before any forced release touches the locks.
    let stranded = config.waiters - returned;
    let lost_unlocks = semaphore.lost_unlocks();
    let recovered = if stranded > 0 {
        release_stranded(&*semaphore, &done_rx, stranded, config.timeout())
    } else {
        0
    };

    if recovered == stranded {
        for waiter in waiters {
            waiter.join().map_err(|_| StressError::WaiterPanicked)?;
        }
    } else {
        warn!(
            "{} of {} stranded {} waiters could not be freed and are left blocked",
            stranded - recovered,
            stranded,
            variant
        );
    }

    Ok(IterationOutcome {
        returned,
        stranded,
        recovered,
        lost_unlocks,
    })
}

/// Force the gate open once per stranded waiter and wait for each to return.
fn release_stranded(
    semaphore: &dyn Semaphore,
    done_rx: &Receiver<usize>,
    stranded: usize,
    timeout: Duration,
) -> usize {
    let mut recovered = 0;
    while recovered < stranded && semaphore.release_stranded() {
        match done_rx.recv_timeout(timeout) {
            Ok(waiter) => {
                trace!("stranded waiter {} freed", waiter);
                recovered += 1;
            },
            Err(_) => break,
        }
    }
    recovered
}

#[derive(Debug, Error)]
pub enum StressError {
    #[error("Must run at least one iteration")]
    NoIterations,
    #[error("Must have at least one waiter")]
    NoWaiters,
    #[error("Timeout must be greater than zero")]
    NoTimeout,
    #[error("The signaller thread panicked")]
    SignallerPanicked,
    #[error("A waiter thread panicked")]
    WaiterPanicked,
    #[error(transparent)]
    Semaphore(#[from] SemaphoreError),
    #[error(transparent)]
    Jitter(#[from] JitterError),
    #[error("Failed to spawn a stress thread: {0}")]
    Spawn(#[from] io::Error),
}
