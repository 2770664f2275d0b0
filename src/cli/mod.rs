//! CLI command implementations.

pub mod config;
pub mod init;
pub mod list;
pub mod remove;
pub mod set;
pub mod start;
pub mod stop;

use macadam::machine::provider::resolve;
use macadam::{Driver, MacadamConfig, VmProvider};
use std::path::PathBuf;
use std::sync::Arc;

/// State shared by the machine commands.
///
/// The provider is resolved once, when the context is built, and every
/// driver created from the context shares it.
pub struct Context {
    /// User configuration.
    pub config: MacadamConfig,
    provider: Arc<dyn VmProvider>,
    store_path: PathBuf,
}

impl Context {
    /// Resolve the provider named by `config` (or the host default).
    pub fn new(config: MacadamConfig) -> macadam::Result<Self> {
        let provider = resolve(config.provider)?;
        let store_path = provider.directories()?.data_dir;
        tracing::debug!(
            vm_type = %provider.vm_type(),
            store = %store_path.display(),
            "resolved provider"
        );

        Ok(Self {
            config,
            provider,
            store_path,
        })
    }

    /// Machine name from the command line, or the configured default.
    pub fn machine_name(&self, name: Option<String>) -> String {
        name.unwrap_or_else(|| self.config.default_machine_name.clone())
    }

    /// Driver for a machine that may not exist yet.
    pub fn new_driver(&self, name: &str) -> Driver {
        Driver::with_provider(name, &self.store_path, Arc::clone(&self.provider))
    }

    /// Driver for an existing machine.
    pub fn load_driver(&self, name: &str) -> macadam::Result<Driver> {
        Driver::load(name, &self.store_path, Arc::clone(&self.provider))
    }

    /// The resolved provider.
    pub fn provider(&self) -> &dyn VmProvider {
        self.provider.as_ref()
    }
}
