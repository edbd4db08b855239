use std::{path::Path, time::Duration};

use anyhow::{bail, Result};
use handoff_core::{Scenario, Variant};
use tracing::{error, info, warn};

use crate::{configuration::Configuration, HandoffCliError};

#[tracing::instrument(skip_all)]
pub fn scenario_handler(
    config_path: &Path,
    scenario: Option<Scenario>,
    variants: &[Variant],
    timeout_ms: Option<u64>,
) -> Result<()> {
    let configuration = Configuration::load_or_default(config_path)?;
    let variants = if variants.is_empty() {
        configuration.variants
    } else {
        variants.to_vec()
    };
    if variants.is_empty() {
        bail!(HandoffCliError::NoVariants);
    }
    let timeout = Duration::from_millis(timeout_ms.unwrap_or(configuration.scenario_timeout_ms));
    let scenarios = scenario.map_or_else(|| Scenario::all().collect(), |scenario| vec![scenario]);

    let mut failed = vec![];
    for scenario in scenarios {
        for &variant in &variants {
            info!("Running {} against {}", scenario, variant);
            match scenario.run(variant, timeout) {
                Ok(outcome) => {
                    println!(
                        "{:<13} {:<10} ok      {}",
                        scenario.to_string(),
                        variant.to_string(),
                        outcome.detail
                    );
                },
                Err(err) if !variant.is_correct() => {
                    warn!("{} failed {} as expected: {}", variant, scenario, err);
                    println!(
                        "{:<13} {:<10} FAILED  {} (expected)",
                        scenario.to_string(),
                        variant.to_string(),
                        err
                    );
                },
                Err(err) => {
                    error!("{} failed {}: {}", variant, scenario, err);
                    println!(
                        "{:<13} {:<10} FAILED  {}",
                        scenario.to_string(),
                        variant.to_string(),
                        err
                    );
                    failed.push(format!("{variant}/{scenario}"));
                },
            }
        }
    }

    if !failed.is_empty() {
        bail!(HandoffCliError::ScenarioFailed(failed.join(", ")));
    }

    Ok(())
}
