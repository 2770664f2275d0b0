//! Host directory layout.
//!
//! ```text
//! <config>/macadam/machines.conf           user configuration
//! <config>/macadam/machine/<vmtype>/       machine records
//! <data>/macadam/machine/<vmtype>/         disk images
//! <data>/macadam/machine/<vmtype>/cache/   downloaded image cache
//! <runtime>/macadam/                       pid files
//! ```
//!
//! `MACADAM_HOME` relocates everything under a single directory.

use crate::error::{Error, Result};
use crate::machine::config::VmType;
use std::path::{Path, PathBuf};

/// Application directory name.
const APP_NAME: &str = "macadam";

/// User configuration file name.
const CONFIG_FILE: &str = "machines.conf";

/// Overrides every directory below.
pub const HOME_ENV: &str = "MACADAM_HOME";

/// Directories used by a provider of one virtualization type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineDirs {
    /// Machine records.
    pub config_dir: PathBuf,
    /// Disk images.
    pub data_dir: PathBuf,
    /// Downloaded image cache.
    pub image_cache_dir: PathBuf,
    /// Pid files and sockets.
    pub runtime_dir: PathBuf,
}

impl MachineDirs {
    /// Resolve the directories for `vm_type` on this host.
    pub fn for_vm_type(vm_type: VmType) -> Result<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return Ok(Self::under(Path::new(&home), vm_type));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .ok_or_else(|| Error::Config("could not determine data directory".into()))?;
        let runtime_dir = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(std::env::temp_dir);

        let data_dir = data_dir.join(APP_NAME).join("machine").join(vm_type.name());
        Ok(Self {
            config_dir: config_dir.join(APP_NAME).join("machine").join(vm_type.name()),
            image_cache_dir: data_dir.join("cache"),
            data_dir,
            runtime_dir: runtime_dir.join(APP_NAME),
        })
    }

    /// Lay out all directories under one root.
    pub fn under(root: &Path, vm_type: VmType) -> Self {
        let data_dir = root.join("data").join(vm_type.name());
        Self {
            config_dir: root.join("config").join(vm_type.name()),
            image_cache_dir: data_dir.join("cache"),
            data_dir,
            runtime_dir: root.join("run"),
        }
    }

    /// Create every directory that does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.image_cache_dir,
            &self.runtime_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Path of the user configuration file.
///
/// `$XDG_CONFIG_HOME/macadam/machines.conf` on Linux, the platform config
/// directory elsewhere (`%APPDATA%` on Windows).
pub fn user_config_path() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home).join(CONFIG_FILE));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
    Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
}
