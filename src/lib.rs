//! macadam - machine lifecycle driver
//!
//! macadam creates, starts, stops and removes local virtual machines through
//! a pluggable VM provider, and fetches their boot disks through a pluggable
//! image puller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  macadam CLI                                    │
//! ├─────────────────────────────────────────────────┤
//! │  Driver (create/start/stop/kill/remove/update)  │
//! ├────────────────────────┬────────────────────────┤
//! │  ImagePuller           │  VmProvider            │
//! │  (noop, copy, http)    │  (qemu)                │
//! └────────────────────────┴────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use macadam::{Driver, ResourceSpec, GIB};
//!
//! let mut driver = Driver::new("dev", "/var/lib/macadam")?
//!     .with_resources(ResourceSpec::new(4, 8192, 50 * GIB))
//!     .with_image_source("https://example.com/fedora-coreos.qcow2");
//!
//! driver.create()?;
//! driver.start()?;
//! println!("{}", driver.get_state()?);
//! # Ok::<(), macadam::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod env;
pub mod error;
pub mod image;
pub mod machine;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use config::MacadamConfig;
pub use env::MachineDirs;
pub use error::{Error, Result};
pub use image::{CopyPuller, HttpPuller, ImagePuller, NoopPuller};
pub use machine::{
    gib_to_bytes, Driver, DriverSettings, LifecycleState, MachineConfig, ProviderStatus,
    ResourceSpec, SetOptions, SshAccess, VmProvider, VmType, GIB,
};

/// Version of macadam.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
