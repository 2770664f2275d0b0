//! Configuration CLI commands.

use clap::{Args, Subcommand};
use macadam::{MacadamConfig, Result};

/// Configuration commands
#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Show current configuration
    Show(ShowCmd),

    /// Write a configuration file with the defaults
    Init(InitCmd),
}

impl ConfigCmd {
    pub fn run(self, config: &MacadamConfig) -> Result<()> {
        match self {
            ConfigCmd::Show(cmd) => cmd.run(config),
            ConfigCmd::Init(cmd) => cmd.run(),
        }
    }
}

/// Show current configuration
#[derive(Args, Debug)]
pub struct ShowCmd {}

impl ShowCmd {
    pub fn run(self, config: &MacadamConfig) -> Result<()> {
        let path = macadam::env::user_config_path()?;
        println!("# Config file: {}", path.display());
        if !path.exists() {
            println!("# Status: not configured (using defaults)");
        }
        print!("{}", config.to_toml()?);
        Ok(())
    }
}

/// Write a configuration file with the defaults
#[derive(Args, Debug)]
pub struct InitCmd {
    /// Overwrite an existing configuration file.
    #[arg(short, long)]
    pub force: bool,
}

impl InitCmd {
    pub fn run(self) -> Result<()> {
        let path = macadam::env::user_config_path()?;
        if path.exists() && !self.force {
            return Err(macadam::Error::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }

        let path = MacadamConfig::default().save()?;
        println!("Wrote {}", path.display());
        Ok(())
    }
}
