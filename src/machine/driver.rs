//! Machine lifecycle driver.
//!
//! A [`Driver`] manages one named machine on top of a [`VmProvider`]. It holds
//! the desired settings, a shared provider handle and the last machine record
//! it loaded. Records are owned by the provider; the driver only ever replaces
//! its cached copy with a freshly loaded one.
//!
//! Lifecycle methods take `&mut self` and block until the provider returns.
//! One driver must not be used for two operations at once.

use crate::error::{Error, Result};
use crate::image::{puller_for_source, ImagePuller};
use crate::machine::config::{
    InitOptions, MachineConfig, RemoveOptions, ResourceSpec, SetOptions, SshAccess,
    StartOptions, GIB,
};
use crate::machine::identity::validate_name;
use crate::machine::provider::{self, VmProvider};
use crate::machine::state::LifecycleState;
use crate::util::expand_env_with;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Driver name reported to callers.
pub const DRIVER_NAME: &str = "macadam";

/// Default number of vCPUs.
pub const DEFAULT_CPUS: u64 = 4;

/// Default memory in MiB.
pub const DEFAULT_MEMORY_MIB: u64 = 8192;

/// Guest user when none is configured.
pub const DEFAULT_SSH_USER: &str = "core";

/// Serializable part of a driver. This is the payload of
/// [`Driver::update_config_raw`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Machine name. Immutable.
    pub machine_name: String,

    /// Driver store directory.
    pub store_path: PathBuf,

    /// Desired resources.
    pub resources: ResourceSpec,

    /// SSH access settings.
    #[serde(default)]
    pub ssh: SshAccess,

    /// Where the boot image comes from: a path, `file://` or `http(s)://` URI.
    #[serde(default)]
    pub image_source_path: String,

    /// Volume mounts (`source:target`), may reference environment variables.
    #[serde(default)]
    pub volumes: Vec<String>,
}

impl DriverSettings {
    fn new(name: &str, store_path: &Path) -> Self {
        Self {
            machine_name: name.to_string(),
            store_path: store_path.to_path_buf(),
            resources: ResourceSpec::new(DEFAULT_CPUS, DEFAULT_MEMORY_MIB, 0),
            ssh: SshAccess::default(),
            image_source_path: String::new(),
            volumes: Vec::new(),
        }
    }
}

/// Lifecycle driver for one machine.
pub struct Driver {
    settings: DriverSettings,
    provider: Arc<dyn VmProvider>,
    vm_config: Option<MachineConfig>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("settings", &self.settings)
            .field("provider", &self.provider.vm_type())
            .field("vm_config", &self.vm_config)
            .finish()
    }
}

impl Driver {
    /// Create a driver using the provider resolved for this host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnavailable`] if no provider can be resolved.
    pub fn new(name: &str, store_path: impl AsRef<Path>) -> Result<Self> {
        let provider = provider::resolve(None)?;
        Ok(Self::with_provider(name, store_path, provider))
    }

    /// Create a driver on an already resolved provider.
    pub fn with_provider(
        name: &str,
        store_path: impl AsRef<Path>,
        provider: Arc<dyn VmProvider>,
    ) -> Self {
        Self {
            settings: DriverSettings::new(name, store_path.as_ref()),
            provider,
            vm_config: None,
        }
    }

    /// Load the driver for an existing machine.
    ///
    /// Resources and SSH settings are taken from the persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the provider has no such machine.
    pub fn load(
        name: &str,
        store_path: impl AsRef<Path>,
        provider: Arc<dyn VmProvider>,
    ) -> Result<Self> {
        let mut driver = Self::with_provider(name, store_path, provider);
        driver.reload()?;

        let config = driver
            .vm_config
            .as_ref()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        driver.settings.resources = ResourceSpec::try_from(config.resources)?;
        driver.settings.ssh = config.ssh.clone();
        driver.settings.volumes = config.volumes.clone();
        driver.settings.image_source_path = config.image_path.display().to_string();

        Ok(driver)
    }

    /// Set the desired resources.
    pub fn with_resources(mut self, resources: ResourceSpec) -> Self {
        self.settings.resources = resources;
        self
    }

    /// Set SSH access.
    pub fn with_ssh(mut self, ssh: SshAccess) -> Self {
        self.settings.ssh = ssh;
        self
    }

    /// Set the boot image source.
    pub fn with_image_source(mut self, source: impl Into<String>) -> Self {
        self.settings.image_source_path = source.into();
        self
    }

    /// Set volume mounts.
    pub fn with_volumes(mut self, volumes: Vec<String>) -> Self {
        self.settings.volumes = volumes;
        self
    }

    /// Driver name.
    pub fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    /// Driver version.
    pub fn driver_version(&self) -> &'static str {
        crate::VERSION
    }

    /// Machine name.
    pub fn machine_name(&self) -> &str {
        &self.settings.machine_name
    }

    /// Current settings.
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Last loaded machine record, if any.
    pub fn vm_config(&self) -> Option<&MachineConfig> {
        self.vm_config.as_ref()
    }

    /// Disk image path handed to the provider.
    pub fn disk_path(&self) -> PathBuf {
        self.settings
            .store_path
            .join(format!("{}.img", self.settings.machine_name))
    }

    /// Validate the machine name before anything is created.
    pub fn pre_create_check(&self) -> Result<()> {
        validate_name(&self.settings.machine_name)
    }

    /// Replace the cached record with the provider's current one.
    ///
    /// The cache is cleared when the machine does not exist.
    pub fn reload(&mut self) -> Result<()> {
        let name = &self.settings.machine_name;
        self.vm_config = self
            .provider
            .exists(name)
            .map_err(|e| Error::backend("exists", name.clone(), e))?;
        Ok(())
    }

    /// Create the machine, fetching or copying the image from the configured
    /// source.
    pub fn create(&mut self) -> Result<()> {
        self.pre_create_check()?;
        self.ensure_absent()?;

        let name = self.settings.machine_name.clone();
        let dirs = self
            .provider
            .directories()
            .map_err(|e| Error::backend("directories", name.clone(), e))?;
        let puller = puller_for_source(
            &self.settings.image_source_path,
            self.provider.vm_type(),
            &name,
            &dirs,
        );

        self.init_machine(puller)
    }

    /// Create the machine using `puller` to materialize the boot image.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidName`] before any provider call
    /// - [`Error::AlreadyExists`] if the machine exists; the existing record
    ///   is cached
    /// - [`Error::Backend`] if the provider fails
    pub fn create_with_puller(&mut self, puller: Box<dyn ImagePuller>) -> Result<()> {
        self.pre_create_check()?;
        self.ensure_absent()?;
        self.init_machine(puller)
    }

    /// Fail with [`Error::AlreadyExists`] if the machine exists, caching its
    /// record.
    fn ensure_absent(&mut self) -> Result<()> {
        let name = &self.settings.machine_name;
        let existing = self
            .provider
            .exists(name)
            .map_err(|e| Error::backend("exists", name.clone(), e))?;
        if let Some(config) = existing {
            let name = name.clone();
            self.vm_config = Some(config);
            return Err(Error::AlreadyExists(name));
        }
        Ok(())
    }

    fn init_machine(&mut self, mut puller: Box<dyn ImagePuller>) -> Result<()> {
        let name = self.settings.machine_name.clone();
        puller.set_source_uri(&self.settings.image_source_path);

        let mut opts = self.init_options(|key| std::env::var(key).ok());
        opts.image_puller = Some(puller);

        tracing::info!(
            machine = %name,
            cpus = opts.cpus,
            memory_mib = opts.memory_mib,
            disk_size_gib = opts.disk_size_gib,
            "creating machine"
        );
        self.provider
            .init(opts)
            .map_err(|e| Error::backend("init", name.clone(), e))?;

        self.reload()?;
        tracing::info!(machine = %name, "machine created");
        Ok(())
    }

    /// Provider options for `init`, with volume variables resolved through
    /// `lookup`.
    fn init_options<F>(&self, lookup: F) -> InitOptions
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = &self.settings;
        let username = if settings.ssh.remote_username.is_empty() {
            DEFAULT_SSH_USER.to_string()
        } else {
            settings.ssh.remote_username.clone()
        };

        InitOptions {
            name: settings.machine_name.clone(),
            cpus: settings.resources.cpus,
            memory_mib: settings.resources.memory_mib,
            disk_size_gib: settings.resources.disk_capacity_bytes / GIB,
            timezone: String::new(),
            username,
            ssh_identity_path: settings.ssh.identity_path.clone(),
            image: self.disk_path(),
            volumes: settings
                .volumes
                .iter()
                .map(|v| expand_env_with(v, &lookup))
                .collect(),
            usbs: Vec::new(),
            ignition_path: None,
            rootful: false,
            user_mode_networking: false,
            image_puller: None,
        }
    }

    fn require_config(&self) -> Result<&MachineConfig> {
        self.vm_config
            .as_ref()
            .ok_or_else(|| Error::Uninitialized(self.settings.machine_name.clone()))
    }

    /// Start the machine with default options.
    pub fn start(&mut self) -> Result<()> {
        self.start_with(StartOptions::default())
    }

    /// Start the machine.
    ///
    /// Returns once the provider's start call returns; there is no polling
    /// for readiness.
    pub fn start_with(&mut self, opts: StartOptions) -> Result<()> {
        let config = self.require_config()?;
        let name = &config.name;

        let dirs = self
            .provider
            .directories()
            .map_err(|e| Error::backend("directories", name.clone(), e))?;

        tracing::info!(machine = %name, "starting machine");
        self.provider
            .start(config, &dirs, &opts)
            .map_err(|e| Error::backend("start", name.clone(), e))?;
        tracing::info!(machine = %name, "machine started");

        Ok(())
    }

    /// Current lifecycle state.
    ///
    /// A driver without a loaded record reports [`LifecycleState::Stopped`]
    /// without asking the provider.
    pub fn get_state(&self) -> Result<LifecycleState> {
        let Some(config) = &self.vm_config else {
            return Ok(LifecycleState::Stopped);
        };

        let status = self
            .provider
            .state(config, false)
            .map_err(|e| Error::backend("state", config.name.clone(), e))?;
        Ok(status.into())
    }

    /// Stop the machine gracefully.
    pub fn stop(&mut self) -> Result<()> {
        self.stop_machine(false)
    }

    /// Stop the machine immediately.
    pub fn kill(&mut self) -> Result<()> {
        self.stop_machine(true)
    }

    fn stop_machine(&self, hard: bool) -> Result<()> {
        let config = self.require_config()?;
        let name = &config.name;

        let dirs = self
            .provider
            .directories()
            .map_err(|e| Error::backend("directories", name.clone(), e))?;

        tracing::info!(machine = %name, hard, "stopping machine");
        self.provider
            .stop(config, &dirs, hard)
            .map_err(|e| Error::backend("stop", name.clone(), e))
    }

    /// Hard-stop and delete the machine.
    pub fn remove(&mut self) -> Result<()> {
        let config = self.require_config()?;
        let name = &config.name;

        let dirs = self
            .provider
            .directories()
            .map_err(|e| Error::backend("directories", name.clone(), e))?;

        self.provider
            .stop(config, &dirs, true)
            .map_err(|e| Error::backend("stop", name.clone(), e))?;
        self.provider
            .remove(config, &dirs, &RemoveOptions::default())
            .map_err(|e| Error::backend("remove", name.clone(), e))?;

        tracing::info!(machine = %name, "machine removed");
        Ok(())
    }

    /// SSH access of the loaded machine.
    pub fn ssh(&self) -> Result<&SshAccess> {
        Ok(&self.require_config()?.ssh)
    }

    /// Serialize the current settings in the format accepted by
    /// [`update_config_raw`](Driver::update_config_raw).
    pub fn raw_config(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.settings)?)
    }

    /// Apply serialized settings.
    ///
    /// The machine is reloaded from the provider, resource changes are sent
    /// as one sparse update, and on success the driver takes on the new
    /// settings. On any error the driver is left as it was.
    ///
    /// # Errors
    ///
    /// - [`Error::Serialization`] for a malformed payload
    /// - [`Error::Config`] if the payload names a different machine
    /// - [`Error::NotFound`] if the machine does not exist
    /// - [`Error::Backend`] if the provider rejects the update
    pub fn update_config_raw(&mut self, raw: &[u8]) -> Result<()> {
        let desired: DriverSettings = serde_json::from_slice(raw)?;
        if desired.machine_name != self.settings.machine_name {
            return Err(Error::Config(format!(
                "cannot rename machine {} to {}",
                self.settings.machine_name, desired.machine_name
            )));
        }

        let opts = diff_resources(&self.settings.resources, &desired.resources);

        let mut candidate = Driver {
            settings: desired,
            provider: Arc::clone(&self.provider),
            vm_config: None,
        };
        candidate.reload()?;
        let name = candidate.settings.machine_name.clone();
        let config = candidate
            .vm_config
            .as_ref()
            .ok_or_else(|| Error::NotFound(name.clone()))?;

        tracing::debug!(machine = %name, update = ?opts, "applying machine settings");
        candidate
            .provider
            .set(config, &opts)
            .map_err(|e| Error::backend("set", name.clone(), e))?;
        candidate.reload()?;

        *self = candidate;
        Ok(())
    }
}

/// Resource fields that differ between `current` and `desired`.
///
/// Disk sizes are compared and sent in whole GiB.
pub fn diff_resources(current: &ResourceSpec, desired: &ResourceSpec) -> SetOptions {
    let changed = |a: u64, b: u64| (a != b).then_some(b);

    SetOptions {
        cpus: changed(current.cpus, desired.cpus),
        memory_mib: changed(current.memory_mib, desired.memory_mib),
        disk_size_gib: changed(current.disk_size_gib(), desired.disk_size_gib()),
    }
}
