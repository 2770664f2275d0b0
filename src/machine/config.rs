//! Machine configuration types.

use crate::error::{Error, Result};
use crate::image::ImagePuller;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

/// Bytes per GiB.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Virtualization technology backing a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmType {
    /// QEMU (KVM on Linux, HVF on macOS).
    Qemu,
    /// Windows Subsystem for Linux.
    Wsl,
    /// Apple Virtualization.framework.
    AppleHv,
    /// Microsoft Hyper-V.
    HyperV,
    /// libkrun.
    LibKrun,
}

impl VmType {
    /// Every known type. These names are reserved and cannot be machine names.
    pub const ALL: [VmType; 5] = [
        VmType::Qemu,
        VmType::Wsl,
        VmType::AppleHv,
        VmType::HyperV,
        VmType::LibKrun,
    ];

    /// Lowercase name, as accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            VmType::Qemu => "qemu",
            VmType::Wsl => "wsl",
            VmType::AppleHv => "applehv",
            VmType::HyperV => "hyperv",
            VmType::LibKrun => "libkrun",
        }
    }

    /// Parse a type name, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
    }

    /// Disk image file extension used by this type.
    pub fn image_extension(&self) -> &'static str {
        match self {
            VmType::Qemu => ".qcow2",
            VmType::AppleHv | VmType::LibKrun => ".raw",
            VmType::HyperV => ".vhdx",
            VmType::Wsl => "",
        }
    }

    /// Default type for the host platform.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            VmType::Wsl
        } else {
            VmType::Qemu
        }
    }
}

impl FromStr for VmType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidVmType(s.to_string()))
    }
}

impl std::fmt::Display for VmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resources as the driver sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Number of vCPUs.
    pub cpus: u64,

    /// Memory in MiB.
    pub memory_mib: u64,

    /// Disk capacity in bytes.
    pub disk_capacity_bytes: u64,
}

impl ResourceSpec {
    /// Create a resource spec.
    pub fn new(cpus: u64, memory_mib: u64, disk_capacity_bytes: u64) -> Self {
        Self {
            cpus,
            memory_mib,
            disk_capacity_bytes,
        }
    }

    /// Disk capacity in whole GiB, truncated.
    pub fn disk_size_gib(&self) -> u64 {
        self.disk_capacity_bytes / GIB
    }
}

/// Resources as persisted by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineResources {
    /// Number of vCPUs.
    pub cpus: u64,

    /// Memory in MiB.
    pub memory_mib: u64,

    /// Disk size in GiB.
    pub disk_size_gib: u64,
}

impl TryFrom<MachineResources> for ResourceSpec {
    type Error = Error;

    fn try_from(r: MachineResources) -> Result<Self> {
        Ok(Self {
            cpus: r.cpus,
            memory_mib: r.memory_mib,
            disk_capacity_bytes: gib_to_bytes(r.disk_size_gib)?,
        })
    }
}

/// Convert a disk size in GiB to bytes.
///
/// # Errors
///
/// Returns [`Error::Config`] if the size does not fit in a `u64` byte count.
pub fn gib_to_bytes(gib: u64) -> Result<u64> {
    gib.checked_mul(GIB)
        .ok_or_else(|| Error::Config(format!("disk size {} GiB is too large", gib)))
}

/// SSH access to the guest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshAccess {
    /// Private key used to log in.
    #[serde(default)]
    pub identity_path: PathBuf,

    /// Guest user.
    #[serde(default)]
    pub remote_username: String,

    /// Host port forwarded to the guest's sshd.
    #[serde(default)]
    pub port: u16,
}

/// Persisted machine record, owned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Machine name.
    pub name: String,

    /// Virtualization type that created it.
    pub vm_type: VmType,

    /// Boot disk image.
    pub image_path: PathBuf,

    /// Resource allocation.
    pub resources: MachineResources,

    /// SSH access.
    pub ssh: SshAccess,

    /// Volume mounts (`source:target`).
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Guest timezone, empty for the backend default.
    #[serde(default)]
    pub timezone: String,

    /// Prefer rootful container execution.
    #[serde(default)]
    pub rootful: bool,

    /// Route guest traffic through a user-space network stack.
    #[serde(default)]
    pub user_mode_networking: bool,

    /// Creation time.
    pub created: SystemTime,

    /// Last successful start.
    #[serde(default)]
    pub last_up: Option<SystemTime>,

    /// Set while a start is in progress.
    #[serde(default)]
    pub starting: bool,
}

/// Options for creating a machine.
#[derive(Debug, Default)]
pub struct InitOptions {
    /// Machine name.
    pub name: String,
    /// Number of vCPUs.
    pub cpus: u64,
    /// Memory in MiB.
    pub memory_mib: u64,
    /// Disk size in GiB.
    pub disk_size_gib: u64,
    /// Guest timezone, empty for the backend default.
    pub timezone: String,
    /// Guest user.
    pub username: String,
    /// SSH private key.
    pub ssh_identity_path: PathBuf,
    /// Boot disk image path.
    pub image: PathBuf,
    /// Volume mounts (`source:target`).
    pub volumes: Vec<String>,
    /// USB passthrough specs.
    pub usbs: Vec<String>,
    /// Ignition file.
    pub ignition_path: Option<PathBuf>,
    /// Prefer rootful container execution.
    pub rootful: bool,
    /// Use user-mode networking.
    pub user_mode_networking: bool,
    /// Strategy that materializes the boot disk.
    pub image_puller: Option<Box<dyn ImagePuller>>,
}

/// Sparse update request. Only present fields are changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// New vCPU count.
    pub cpus: Option<u64>,
    /// New memory in MiB.
    pub memory_mib: Option<u64>,
    /// New disk size in GiB.
    pub disk_size_gib: Option<u64>,
}

impl SetOptions {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.memory_mib.is_none() && self.disk_size_gib.is_none()
    }
}

/// Options for starting a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Suppress informational tips.
    pub no_info: bool,
    /// Suppress start progress output.
    pub quiet: bool,
}

/// Options for removing a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove even if running.
    pub force: bool,
    /// Keep the disk image.
    pub save_image: bool,
}
