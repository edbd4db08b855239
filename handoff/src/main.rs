use std::{panic, path::PathBuf, process};

use clap::{CommandFactory, Parser};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::{
    commands::{
        config::config_sub_handler,
        scenario::scenario_handler,
        stress::stress_handler,
        variants::variants_handler,
        Commands,
        HandoffCli,
    },
    logging::init_logging,
};

mod commands;
mod configuration;
mod logging;

pub const DEFAULT_CONFIG_PATH: &str = "./handoff.json";
pub const DEFAULT_LOG_PATH: &str = "./logs/handoff.log";

fn main() -> anyhow::Result<()> {
    let orig_hook = panic::take_hook();
    // Catch panics in child threads
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(1);
    }));
    run()
}

fn run() -> anyhow::Result<()> {
    let cli = HandoffCli::parse();

    if let Commands::Completions {
        shell,
    } = cli.command
    {
        clap_complete::generate(
            shell,
            &mut HandoffCli::command(),
            "handoff",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let config_path = path_abs::PathAbs::new(
        cli.config_file.unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_PATH)),
    )?
    .as_path()
    .to_path_buf();
    let logs = cli.logs.unwrap_or_else(|| cwd.join(DEFAULT_LOG_PATH));
    let console_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let _log_guard = init_logging(console_level, &logs, LevelFilter::DEBUG)?;

    match cli.command {
        Commands::Stress(args) => {
            stress_handler(&config_path, &args)?;
        },
        Commands::Scenario {
            scenario,
            variants,
            timeout_ms,
        } => {
            scenario_handler(&config_path, scenario, &variants, timeout_ms)?;
        },
        Commands::Config {
            subcommand,
        } => {
            config_sub_handler(&config_path, subcommand)?;
        },
        Commands::Variants => {
            variants_handler();
        },
        Commands::Completions {
            ..
        } => unreachable!("completions are generated before logging starts"),
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum HandoffCliError {
    #[error("Cannot initialize over an existing config file: {0}")]
    ConfigFileAlreadyExists(PathBuf),
    #[error("No variants selected")]
    NoVariants,
    #[error("Correct variants failed the stress run: {0}")]
    CorrectVariantFailed(String),
    #[error("Correct variants failed scenarios: {0}")]
    ScenarioFailed(String),
}
