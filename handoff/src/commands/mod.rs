use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use clap_complete::Shell;
use handoff_core::{Scenario, Variant};

use crate::commands::{config::ConfigSubcommand, stress::StressArgs};

pub mod config;
pub mod scenario;
pub mod stress;
pub mod variants;

#[derive(ClapParser)]
#[command(
    name = "handoff",
    about = "Stress counting semaphores built from binary locks and reproduce the lost wake-up \
             of the naive construction.",
    version
)]
pub struct HandoffCli {
    #[command(subcommand)]
    pub command:     Commands,
    /// Specify the location of the config file. Defaults to `./handoff.json`.
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,
    /// Specify the log file. Defaults to `./logs/handoff.log`.
    #[arg(long, global = true)]
    pub logs:        Option<PathBuf>,
    /// Show debug output on the console.
    #[arg(long, short('v'), global = true)]
    pub verbose:     bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the two-waiter, two-signal interleaving repeatedly against each variant
    Stress(StressArgs),
    /// Run a named scenario (all scenarios if none is given)
    Scenario {
        scenario:   Option<Scenario>,
        /// Variant to run against. Repeat for several. Defaults to the configured variants.
        #[arg(long = "variant")]
        variants:   Vec<Variant>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// List the semaphore variants
    Variants,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
