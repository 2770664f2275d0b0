//! Init command implementation.

use super::Context;
use clap::Args;
use macadam::{gib_to_bytes, ResourceSpec, SshAccess};
use std::path::PathBuf;

/// Create a machine.
#[derive(Args, Debug)]
pub struct InitCmd {
    /// Bootable disk image: a local path, `file://` or `http(s)://` URI.
    pub image: String,

    /// Machine name.
    #[arg(long)]
    pub name: Option<String>,

    /// Number of vCPUs.
    #[arg(long)]
    pub cpus: Option<u64>,

    /// Memory in MiB.
    #[arg(long, value_name = "MiB")]
    pub memory: Option<u64>,

    /// Disk size in GiB.
    #[arg(long, value_name = "GiB")]
    pub disk_size: Option<u64>,

    /// SSH private key used to access the machine.
    #[arg(long)]
    pub ssh_identity_path: Option<PathBuf>,

    /// Username used in the image.
    #[arg(long)]
    pub username: Option<String>,

    /// Volume to mount (can be used multiple times).
    #[arg(short = 'v', long = "volume", value_name = "SRC:DST")]
    pub volumes: Vec<String>,

    /// Start the machine once created.
    #[arg(long)]
    pub now: bool,
}

impl InitCmd {
    /// Execute the init command.
    pub fn run(self, ctx: &Context) -> macadam::Result<()> {
        let name = ctx.machine_name(self.name);
        let defaults = &ctx.config;

        let resources = ResourceSpec::new(
            self.cpus.unwrap_or(defaults.default_cpus),
            self.memory.unwrap_or(defaults.default_memory_mib),
            gib_to_bytes(self.disk_size.unwrap_or(defaults.default_disk_size_gib))?,
        );
        let ssh = SshAccess {
            identity_path: self
                .ssh_identity_path
                .or_else(|| defaults.ssh_identity_path.clone())
                .unwrap_or_default(),
            remote_username: self
                .username
                .or_else(|| defaults.username.clone())
                .unwrap_or_default(),
            port: 0,
        };

        let mut driver = ctx
            .new_driver(&name)
            .with_resources(resources)
            .with_ssh(ssh)
            .with_image_source(self.image)
            .with_volumes(self.volumes);

        match driver.create() {
            Ok(()) => println!("Machine {} initialized", name),
            Err(e) if e.is_already_exists() => println!("Machine {} already exists", name),
            Err(e) => return Err(e),
        }

        if self.now {
            println!("Starting machine {}...", name);
            driver.start()?;
            println!("Machine {} started", name);
        }

        Ok(())
    }
}
