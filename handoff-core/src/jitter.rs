use std::{thread, time::Duration};

use crossbeam_utils::Backoff;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Artificial scheduling delays injected at lock boundaries.
///
/// Each call to [`Jitter::perturb`] fires with `probability` and then does one
/// of three things at random: spins, yields the time slice, or sleeps for up
/// to `max_sleep_micros`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Jitter {
    pub probability:      f64,
    pub max_spins:        u32,
    pub max_sleep_micros: u64,
}

impl Default for Jitter {
    #[inline]
    fn default() -> Self {
        Self {
            probability:      0.5,
            max_spins:        64,
            max_sleep_micros: 20,
        }
    }
}

impl Jitter {
    #[inline]
    pub const fn none() -> Self {
        Self {
            probability:      0.0,
            max_spins:        0,
            max_sleep_micros: 0,
        }
    }

    #[inline]
    pub fn validate(&self) -> Result<(), JitterError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(JitterError::Probability(self.probability));
        }
        Ok(())
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.probability > 0.0 && self.probability <= 1.0
    }

    #[inline]
    pub fn perturb(&self) {
        if !self.is_active() {
            return;
        }
        let mut rng = rand::rng();
        if !rng.random_bool(self.probability) {
            return;
        }
        match rng.random_range(0..3_u8) {
            0 => {
                let backoff = Backoff::new();
                for _ in 0..rng.random_range(0..=self.max_spins) {
                    backoff.spin();
                }
            },
            1 => thread::yield_now(),
            _ => {
                if self.max_sleep_micros == 0 {
                    thread::yield_now();
                } else {
                    let micros = rng.random_range(0..=self.max_sleep_micros);
                    thread::sleep(Duration::from_micros(micros));
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JitterError {
    #[error("Jitter probability must be within 0.0..=1.0, got {0}")]
    Probability(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_probability() {
        assert!(Jitter::default().validate().is_ok());
        assert!(Jitter::none().validate().is_ok());

        let jitter = Jitter {
            probability: 1.5,
            ..Jitter::default()
        };
        assert_eq!(jitter.validate(), Err(JitterError::Probability(1.5)));

        let jitter = Jitter {
            probability: f64::NAN,
            ..Jitter::default()
        };
        assert!(jitter.validate().is_err());
        assert!(!jitter.is_active());
    }

    #[test]
    fn perturb_is_bounded() {
        let jitter = Jitter {
            probability:      1.0,
            max_spins:        8,
            max_sleep_micros: 10,
        };
        let started = std::time::Instant::now();
        for _ in 0..100 {
            jitter.perturb();
        }
        // 100 sleeps of at most 10µs each, with generous slack for the scheduler.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let jitter: Jitter =
            serde_json::from_str(r#"{ "probability": 0.25 }"#).expect("valid jitter json");
        assert_eq!(jitter.probability, 0.25);
        assert_eq!(jitter.max_spins, Jitter::default().max_spins);
        assert_eq!(jitter.max_sleep_micros, Jitter::default().max_sleep_micros);
    }
}
