//! VM provider implementations.
//!
//! Only QEMU is implemented, and only on unix hosts. Every other
//! [`VmType`] resolves to [`Error::ProviderUnavailable`].

#[cfg(unix)]
mod qemu;

use crate::error::{Error, Result};
use crate::machine::config::VmType;
use crate::machine::provider::VmProvider;
use std::sync::Arc;

#[cfg(unix)]
pub use qemu::QemuProvider;

/// Create the provider for `vm_type`.
pub fn create(vm_type: VmType) -> Result<Arc<dyn VmProvider>> {
    match vm_type {
        #[cfg(unix)]
        VmType::Qemu => Ok(Arc::new(QemuProvider::new()?)),
        other => Err(Error::ProviderUnavailable(format!(
            "{} is not supported on this host",
            other
        ))),
    }
}

/// List the provider types implemented for this host.
pub fn available() -> Vec<VmType> {
    let mut types = Vec::new();

    #[cfg(unix)]
    {
        types.push(VmType::Qemu);
    }

    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unimplemented_types_are_unavailable() {
        for vm_type in [VmType::Wsl, VmType::HyperV, VmType::AppleHv, VmType::LibKrun] {
            let err = create(vm_type).err().expect("provider should be unavailable");
            assert!(
                matches!(err, Error::ProviderUnavailable(ref msg) if msg.contains(vm_type.name())),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn test_available_lists_only_implemented_types() {
        let types = available();
        assert!(!types.contains(&VmType::Wsl));
        assert!(!types.contains(&VmType::HyperV));
        #[cfg(unix)]
        assert_eq!(types, vec![VmType::Qemu]);
    }
}
