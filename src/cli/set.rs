//! Set command implementation.

use super::Context;
use clap::Args;
use macadam::gib_to_bytes;

/// Change the resources of a stopped machine.
#[derive(Args, Debug)]
pub struct SetCmd {
    /// Machine name (defaults to the configured machine).
    pub name: Option<String>,

    /// Number of vCPUs.
    #[arg(long)]
    pub cpus: Option<u64>,

    /// Memory in MiB.
    #[arg(long, value_name = "MiB")]
    pub memory: Option<u64>,

    /// Disk size in GiB. Disks can only grow.
    #[arg(long, value_name = "GiB")]
    pub disk_size: Option<u64>,
}

impl SetCmd {
    /// Execute the set command.
    pub fn run(self, ctx: &Context) -> macadam::Result<()> {
        let name = ctx.machine_name(self.name);
        let mut driver = ctx.load_driver(&name)?;

        if self.cpus.is_none() && self.memory.is_none() && self.disk_size.is_none() {
            println!("Nothing to change for machine {}", name);
            return Ok(());
        }

        let mut settings = driver.settings().clone();
        if let Some(cpus) = self.cpus {
            settings.resources.cpus = cpus;
        }
        if let Some(memory) = self.memory {
            settings.resources.memory_mib = memory;
        }
        if let Some(disk_size) = self.disk_size {
            settings.resources.disk_capacity_bytes = gib_to_bytes(disk_size)?;
        }

        let raw = serde_json::to_vec(&settings)?;
        driver.update_config_raw(&raw)?;

        println!("Updated machine: {}", name);
        Ok(())
    }
}
