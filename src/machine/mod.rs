//! Machine lifecycle management.
//!
//! This module provides the lifecycle driver and the abstractions it sits on:
//! - [`Driver`]: create, start, stop, kill, remove, state and config reload
//!   for one named machine
//! - [`VmProvider`]: trait for virtualization backends (e.g., QEMU)
//! - [`MachineConfig`]: the provider-owned machine record
//! - [`LifecycleState`]: state as seen by callers of the driver

pub mod backend;
pub mod config;
pub mod driver;
pub mod identity;
pub mod provider;
pub mod state;

pub use config::{
    gib_to_bytes, InitOptions, MachineConfig, MachineResources, RemoveOptions, ResourceSpec,
    SetOptions, SshAccess, StartOptions, VmType, GIB,
};
pub use driver::{diff_resources, Driver, DriverSettings};
pub use identity::{validate_name, MAX_MACHINE_NAME_LEN};
pub use provider::{resolve, VmProvider};
pub use state::{LifecycleState, ProviderStatus};
