//! VM provider abstraction and resolution.

use crate::env::MachineDirs;
use crate::error::Result;
use crate::machine::config::{
    InitOptions, MachineConfig, RemoveOptions, SetOptions, StartOptions, VmType,
};
use crate::machine::state::ProviderStatus;
use std::sync::Arc;

/// Environment variable selecting the provider type.
pub const PROVIDER_ENV: &str = "MACADAM_PROVIDER";

/// Backend for one virtualization technology.
///
/// A provider owns the persisted [`MachineConfig`] records. Everything that
/// changes a record goes through one of these calls.
pub trait VmProvider: Send + Sync {
    /// Virtualization type implemented by this provider.
    fn vm_type(&self) -> VmType;

    /// Look up a machine by name.
    fn exists(&self, name: &str) -> Result<Option<MachineConfig>>;

    /// Every machine this provider knows, sorted by name.
    fn list(&self) -> Result<Vec<MachineConfig>>;

    /// Create a machine, materializing its disk through `opts.image_puller`.
    fn init(&self, opts: InitOptions) -> Result<()>;

    /// Boot a machine. Returns once the VM has started or failed to.
    fn start(&self, config: &MachineConfig, dirs: &MachineDirs, opts: &StartOptions)
        -> Result<()>;

    /// Stop a machine; `hard` skips the graceful shutdown.
    fn stop(&self, config: &MachineConfig, dirs: &MachineDirs, hard: bool) -> Result<()>;

    /// Delete a machine and its record.
    fn remove(&self, config: &MachineConfig, dirs: &MachineDirs, opts: &RemoveOptions)
        -> Result<()>;

    /// Apply a sparse resource update.
    fn set(&self, config: &MachineConfig, opts: &SetOptions) -> Result<()>;

    /// Current status of a machine.
    fn state(&self, config: &MachineConfig, force_refresh: bool) -> Result<ProviderStatus>;

    /// Directories used by this provider.
    fn directories(&self) -> Result<MachineDirs> {
        MachineDirs::for_vm_type(self.vm_type())
    }
}

/// Resolve the provider for this host.
///
/// `MACADAM_PROVIDER` wins over `preferred`, which wins over the platform
/// default.
///
/// # Errors
///
/// Returns [`Error::ProviderUnavailable`](crate::Error::ProviderUnavailable) if the selected type has no
/// implementation on this host, and [`Error::InvalidVmType`](crate::Error::InvalidVmType) for an unknown
/// type name in the environment.
pub fn resolve(preferred: Option<VmType>) -> Result<Arc<dyn VmProvider>> {
    let from_env = match std::env::var(PROVIDER_ENV) {
        Ok(value) if !value.trim().is_empty() => Some(value.parse::<VmType>()?),
        _ => None,
    };

    let vm_type = from_env
        .or(preferred)
        .unwrap_or_else(VmType::platform_default);
    tracing::debug!(vm_type = %vm_type, "resolving provider");

    super::backend::create(vm_type)
}
