//! Start command implementation.

use super::Context;
use clap::Args;
use macadam::machine::StartOptions;

/// Start an existing machine.
#[derive(Args, Debug)]
pub struct StartCmd {
    /// Machine name (defaults to the configured machine).
    pub name: Option<String>,

    /// Suppress informational tips.
    #[arg(long)]
    pub no_info: bool,

    /// Suppress machine starting status output.
    #[arg(short, long)]
    pub quiet: bool,
}

impl StartCmd {
    /// Execute the start command.
    pub fn run(self, ctx: &Context) -> macadam::Result<()> {
        let name = ctx.machine_name(self.name);
        let mut driver = ctx.load_driver(&name)?;

        let state = driver.get_state()?;
        if state.is_running() {
            return Err(macadam::Error::InvalidState {
                expected: "stopped".to_string(),
                actual: state.to_string(),
            });
        }

        if !self.quiet {
            println!("Starting machine {}...", name);
        }

        driver.start_with(StartOptions {
            no_info: self.no_info,
            quiet: self.quiet,
        })?;

        if !self.quiet {
            println!("Machine {} started successfully", name);
        }

        if !self.no_info {
            let ssh = driver.ssh()?;
            let mut command = format!("ssh -p {}", ssh.port);
            if !ssh.identity_path.as_os_str().is_empty() {
                command.push_str(&format!(" -i {}", ssh.identity_path.display()));
            }
            println!();
            println!("Connect with: {} {}@localhost", command, ssh.remote_username);
        }

        Ok(())
    }
}
