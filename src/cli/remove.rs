//! Remove command implementation.

use super::Context;
use clap::Args;

/// Stop and delete a machine.
#[derive(Args, Debug)]
pub struct RemoveCmd {
    /// Machine name (defaults to the configured machine).
    pub name: Option<String>,
}

impl RemoveCmd {
    /// Execute the remove command.
    pub fn run(self, ctx: &Context) -> macadam::Result<()> {
        let name = ctx.machine_name(self.name);
        let mut driver = ctx.load_driver(&name)?;

        driver.remove()?;

        println!("Removed machine: {}", name);
        Ok(())
    }
}
