//! User configuration.
//!
//! Defaults for new machines and the preferred provider, stored as TOML in
//! `machines.conf` (see [`crate::env::user_config_path`]). A missing file
//! means all defaults.

use crate::error::{Error, Result};
use crate::machine::config::VmType;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// User configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacadamConfig {
    /// Machine name used when a command is given none.
    pub default_machine_name: String,

    /// Default number of vCPUs for new machines.
    pub default_cpus: u64,

    /// Default memory in MiB for new machines.
    pub default_memory_mib: u64,

    /// Default disk size in GiB for new machines.
    pub default_disk_size_gib: u64,

    /// Preferred provider. `MACADAM_PROVIDER` overrides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<VmType>,

    /// SSH private key for new machines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_identity_path: Option<PathBuf>,

    /// Guest user for new machines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Default for MacadamConfig {
    fn default() -> Self {
        Self {
            default_machine_name: "macadam".to_string(),
            default_cpus: 4,
            default_memory_mib: 8192,
            default_disk_size_gib: 50,
            provider: None,
            ssh_identity_path: None,
            username: None,
        }
    }
}

impl MacadamConfig {
    /// Load configuration from the user config path.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&crate::env::user_config_path()?)
    }

    /// Load configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::ConfigLoad(format!("{}: {}", path.display(), e)));
            }
        };

        toml::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to the user config path.
    pub fn save(&self) -> Result<PathBuf> {
        let path = crate::env::user_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to `path`, replacing any existing file atomically.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        let parent = path
            .parent()
            .ok_or_else(|| Error::ConfigSave(format!("{}: no parent directory", path.display())))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::ConfigSave(format!("{}: {}", parent.display(), e)))?;

        let mut file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| Error::ConfigSave(e.to_string()))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| Error::ConfigSave(e.to_string()))?;
        file.persist(path)
            .map_err(|e| Error::ConfigSave(format!("{}: {}", path.display(), e.error)))?;

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigSave(e.to_string()))
    }
}
