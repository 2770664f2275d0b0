//! Stop command implementation.

use super::Context;
use clap::Args;

/// Stop a running machine.
#[derive(Args, Debug)]
pub struct StopCmd {
    /// Machine name (defaults to the configured machine).
    pub name: Option<String>,

    /// Kill the machine instead of shutting it down.
    #[arg(short, long)]
    pub force: bool,
}

impl StopCmd {
    /// Execute the stop command.
    pub fn run(self, ctx: &Context) -> macadam::Result<()> {
        let name = ctx.machine_name(self.name);
        let mut driver = ctx.load_driver(&name)?;

        println!("Stopping machine {}...", name);
        if self.force {
            driver.kill()?;
        } else {
            driver.stop()?;
        }

        println!("Machine {} stopped", name);
        Ok(())
    }
}
