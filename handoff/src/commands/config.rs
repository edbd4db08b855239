use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;
use tracing::{error, info};

use crate::{configuration::Configuration, HandoffCliError};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write the default configuration
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

pub fn config_sub_handler(config_path: &Path, subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Init {
            force,
        } => {
            if config_path.exists() && !force {
                let err = HandoffCliError::ConfigFileAlreadyExists(config_path.to_path_buf());
                error!("{}", err);
                bail!(err);
            }
            Configuration::default().save(config_path)?;
            info!(
                "Initialized handoff configuration at: {}",
                config_path.display()
            );
        },
        ConfigSubcommand::Show => {
            let configuration = Configuration::load_or_default(config_path)?;
            println!("{}", serde_json::to_string_pretty(&configuration)?);
        },
    }

    Ok(())
}
