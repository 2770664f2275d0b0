//! macadam CLI entry point.

use clap::{Parser, Subcommand};
use macadam::config::MacadamConfig;
use tracing_subscriber::EnvFilter;

mod cli;

/// Log format selector; `json` switches to structured output.
const LOG_FORMAT_ENV: &str = "MACADAM_LOG_FORMAT";

/// macadam - manage a local virtual machine
#[derive(Parser, Debug)]
#[command(name = "macadam")]
#[command(about = "Create, start and stop local virtual machines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a machine from a disk image.
    Init(cli::init::InitCmd),

    /// Start an existing machine.
    Start(cli::start::StartCmd),

    /// Stop a running machine.
    Stop(cli::stop::StopCmd),

    /// Stop and delete a machine.
    #[command(alias = "remove")]
    Rm(cli::remove::RemoveCmd),

    /// List machines.
    #[command(alias = "ls")]
    List(cli::list::ListCmd),

    /// Change machine resources.
    Set(cli::set::SetCmd),

    /// Manage configuration.
    #[command(subcommand)]
    Config(cli::config::ConfigCmd),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on RUST_LOG or default to warn
    init_logging();

    tracing::debug!(version = macadam::VERSION, "starting macadam");

    let config = match MacadamConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            MacadamConfig::default()
        }
    };

    let result = match cli.command {
        Commands::Config(cmd) => cmd.run(&config),
        command => run_machine_command(command, config),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Resolve the provider once and run a machine command with it.
fn run_machine_command(command: Commands, config: MacadamConfig) -> macadam::Result<()> {
    let ctx = cli::Context::new(config)?;

    match command {
        Commands::Init(cmd) => cmd.run(&ctx),
        Commands::Start(cmd) => cmd.run(&ctx),
        Commands::Stop(cmd) => cmd.run(&ctx),
        Commands::Rm(cmd) => cmd.run(&ctx),
        Commands::List(cmd) => cmd.run(&ctx),
        Commands::Set(cmd) => cmd.run(&ctx),
        Commands::Config(cmd) => cmd.run(&ctx.config),
    }
}

/// Initialize the tracing subscriber.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("macadam=warn"));

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
