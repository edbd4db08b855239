use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use handoff_core::{run_stress, Jitter, StressConfig, StressReport, Variant};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    configuration::{save_pretty_json, Configuration},
    HandoffCliError,
};

#[derive(Args, Debug)]
pub struct StressArgs {
    /// Variant to stress. Repeat for several. Defaults to the configured variants.
    #[arg(long = "variant")]
    pub variants:   Vec<Variant>,
    /// Number of iterations per variant
    #[arg(long, short)]
    pub iterations: Option<usize>,
    /// How long the waiters of one iteration get to return
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Pause between starting the waiters and the signaller
    #[arg(long)]
    pub settle_us:  Option<u64>,
    /// Waiters per iteration. The signaller signals once per waiter.
    #[arg(long, short)]
    pub waiters:    Option<usize>,
    /// Initial count of each semaphore
    #[arg(long, allow_negative_numbers = true)]
    pub initial:    Option<isize>,
    /// Disable the random delays around lock operations
    #[arg(long)]
    pub no_jitter:  bool,
    /// Run every iteration instead of stopping at the first hang
    #[arg(long)]
    pub keep_going: bool,
    /// Write a JSON report to this path
    #[arg(long)]
    pub report:     Option<PathBuf>,
}

impl StressArgs {
    #[inline]
    pub fn apply(&self, config: &mut StressConfig) {
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(settle_us) = self.settle_us {
            config.settle_micros = settle_us;
        }
        if let Some(waiters) = self.waiters {
            config.waiters = waiters;
        }
        if let Some(initial) = self.initial {
            config.initial = initial;
        }
        if self.no_jitter {
            config.jitter = Jitter::none();
        }
        if self.keep_going {
            config.stop_after_hangs = 0;
        }
    }
}

#[derive(Serialize)]
struct StressSummary<'a> {
    config:  &'a StressConfig,
    reports: &'a [StressReport],
}

#[tracing::instrument(skip_all)]
pub fn stress_handler(config_path: &Path, args: &StressArgs) -> Result<()> {
    let configuration = Configuration::load_or_default(config_path)?;
    let mut config = configuration.stress;
    args.apply(&mut config);
    config.validate()?;

    let variants = if args.variants.is_empty() {
        configuration.variants
    } else {
        args.variants.clone()
    };
    if variants.is_empty() {
        bail!(HandoffCliError::NoVariants);
    }

    let mut reports = Vec::with_capacity(variants.len());
    for variant in variants {
        info!(
            "Stressing {} for {} iterations with {} waiters",
            variant, config.iterations, config.waiters
        );
        let report = run_stress(variant, &config, |progress| {
            info!(
                "{}: {}/{} iterations, {} hung",
                progress.variant, progress.iteration, progress.total, progress.hangs
            );
        })?;
        reports.push(report);
    }

    println!(
        "{:<10} {:>10} {:>6} {:>9} {:>7} {:>11} {:>11} {:>8}",
        "variant", "iterations", "hangs", "stranded", "leaked", "first hang", "lost unlock", "ms"
    );
    for report in &reports {
        println!(
            "{:<10} {:>10} {:>6} {:>9} {:>7} {:>11} {:>11} {:>8}",
            report.variant.to_string(),
            report.iterations_run,
            report.hangs,
            report.stranded_waiters,
            report.leaked_waiters,
            report.first_hang_iteration.map_or_else(|| "-".to_owned(), |i| i.to_string()),
            report.lost_unlocks,
            report.elapsed_ms
        );
    }

    if let Some(report_path) = &args.report {
        save_pretty_json(
            &StressSummary {
                config:  &config,
                reports: &reports,
            },
            report_path,
        )?;
        info!("Wrote stress report to {}", report_path.display());
    }

    for report in reports.iter().filter(|report| !report.variant.is_correct()) {
        if report.passed() {
            warn!(
                "{} did not lose a wake-up in {} iterations; try more iterations or a longer \
                 settle",
                report.variant, report.iterations_run
            );
        } else {
            info!(
                "{} lost a wake-up at iteration {}, as expected",
                report.variant,
                report.first_hang_iteration.unwrap_or_default()
            );
        }
    }

    let failed = reports
        .iter()
        .filter(|report| report.variant.is_correct() && !report.passed())
        .map(|report| report.variant.to_string())
        .collect::<Vec<_>>();
    if !failed.is_empty() {
        let err = HandoffCliError::CorrectVariantFailed(failed.join(", "));
        error!("{}", err);
        bail!(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: StressArgs,
    }

    #[test]
    fn overrides_only_what_is_given() {
        let harness = Harness::parse_from(["stress", "--iterations", "10", "--no-jitter"]);
        let mut config = StressConfig::default();
        harness.args.apply(&mut config);

        assert_eq!(config.iterations, 10);
        assert!(!config.jitter.is_active());
        assert_eq!(config.waiters, StressConfig::default().waiters);
        assert_eq!(config.stop_after_hangs, 1);
    }

    #[test]
    fn keep_going_disables_early_stop() {
        let harness = Harness::parse_from([
            "stress",
            "--keep-going",
            "--variant",
            "naive",
            "--variant",
            "turnstile",
        ]);
        let mut config = StressConfig::default();
        harness.args.apply(&mut config);

        assert_eq!(config.stop_after_hangs, 0);
        assert_eq!(harness.args.variants, vec![Variant::Naive, Variant::Turnstile]);
    }

    #[test]
    fn negative_initial_count_is_parsed_then_rejected() {
        let harness = Harness::parse_from(["stress", "--initial", "-1"]);
        let mut config = StressConfig::default();
        harness.args.apply(&mut config);

        assert_eq!(config.initial, -1);
        assert!(config.validate().is_err());
    }
}
