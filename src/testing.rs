//! In-memory provider that records every call, for driver tests.

use crate::env::MachineDirs;
use crate::error::{Error, Result};
use crate::image::{ImagePuller, NoopPuller};
use crate::machine::config::{
    InitOptions, MachineConfig, MachineResources, RemoveOptions, SetOptions, SshAccess,
    StartOptions, VmType,
};
use crate::machine::provider::VmProvider;
use crate::machine::state::ProviderStatus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::SystemTime;
use tempfile::TempDir;

/// Provider call, in the order the driver made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Exists(String),
    Init(String),
    Start(String),
    Stop { name: String, hard: bool },
    Remove(String),
    Set(SetOptions),
    State(String),
}

struct Inner {
    machines: HashMap<String, MachineConfig>,
    calls: Vec<Call>,
    status: ProviderStatus,
    fail_on: Option<&'static str>,
}

pub(crate) struct RecordingProvider {
    inner: Mutex<Inner>,
    root: TempDir,
}

impl RecordingProvider {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                machines: HashMap::new(),
                calls: Vec::new(),
                status: ProviderStatus::Stopped,
                fail_on: None,
            }),
            root: tempfile::tempdir().expect("create provider root"),
        }
    }

    /// Status reported by every later `state` call.
    pub(crate) fn set_status(&self, status: ProviderStatus) {
        self.inner.lock().status = status;
    }

    /// Make operation `op` fail from now on.
    pub(crate) fn fail_on(&self, op: &'static str) {
        self.inner.lock().fail_on = Some(op);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub(crate) fn machine(&self, name: &str) -> Option<MachineConfig> {
        self.inner.lock().machines.get(name).cloned()
    }

    fn record(&self, call: Call, op: &'static str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        if inner.fail_on == Some(op) {
            return Err(Error::command_failed(op, "injected failure"));
        }
        Ok(())
    }
}

impl VmProvider for RecordingProvider {
    fn vm_type(&self) -> VmType {
        VmType::Qemu
    }

    fn exists(&self, name: &str) -> Result<Option<MachineConfig>> {
        self.record(Call::Exists(name.to_string()), "exists")?;
        Ok(self.machine(name))
    }

    fn list(&self) -> Result<Vec<MachineConfig>> {
        let mut machines: Vec<_> = self.inner.lock().machines.values().cloned().collect();
        machines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(machines)
    }

    fn init(&self, opts: InitOptions) -> Result<()> {
        self.record(Call::Init(opts.name.clone()), "init")?;
        if self.machine(&opts.name).is_some() {
            return Err(Error::AlreadyExists(opts.name));
        }

        let puller: Box<dyn ImagePuller> = match opts.image_puller {
            Some(puller) => puller,
            None => Box::new(NoopPuller::new(opts.image.clone())),
        };
        puller.download()?;
        let image_path = puller.local_path()?;

        let config = MachineConfig {
            name: opts.name.clone(),
            vm_type: VmType::Qemu,
            image_path,
            resources: MachineResources {
                cpus: opts.cpus,
                memory_mib: opts.memory_mib,
                disk_size_gib: opts.disk_size_gib,
            },
            ssh: SshAccess {
                identity_path: opts.ssh_identity_path,
                remote_username: opts.username,
                port: 2222,
            },
            volumes: opts.volumes,
            timezone: opts.timezone,
            rootful: opts.rootful,
            user_mode_networking: opts.user_mode_networking,
            created: SystemTime::UNIX_EPOCH,
            last_up: None,
            starting: false,
        };
        self.inner.lock().machines.insert(opts.name, config);
        Ok(())
    }

    fn start(&self, config: &MachineConfig, _: &MachineDirs, _: &StartOptions) -> Result<()> {
        self.record(Call::Start(config.name.clone()), "start")
    }

    fn stop(&self, config: &MachineConfig, _: &MachineDirs, hard: bool) -> Result<()> {
        self.record(
            Call::Stop {
                name: config.name.clone(),
                hard,
            },
            "stop",
        )
    }

    fn remove(&self, config: &MachineConfig, _: &MachineDirs, _: &RemoveOptions) -> Result<()> {
        self.record(Call::Remove(config.name.clone()), "remove")?;
        self.inner.lock().machines.remove(&config.name);
        Ok(())
    }

    fn set(&self, config: &MachineConfig, opts: &SetOptions) -> Result<()> {
        self.record(Call::Set(*opts), "set")?;

        let mut inner = self.inner.lock();
        let machine = inner
            .machines
            .get_mut(&config.name)
            .ok_or_else(|| Error::NotFound(config.name.clone()))?;
        if let Some(cpus) = opts.cpus {
            machine.resources.cpus = cpus;
        }
        if let Some(memory_mib) = opts.memory_mib {
            machine.resources.memory_mib = memory_mib;
        }
        if let Some(disk_size_gib) = opts.disk_size_gib {
            machine.resources.disk_size_gib = disk_size_gib;
        }
        Ok(())
    }

    fn state(&self, config: &MachineConfig, _force_refresh: bool) -> Result<ProviderStatus> {
        self.record(Call::State(config.name.clone()), "state")?;
        Ok(self.inner.lock().status)
    }

    fn directories(&self) -> Result<MachineDirs> {
        if self.inner.lock().fail_on == Some("directories") {
            return Err(Error::command_failed("directories", "injected failure"));
        }
        Ok(MachineDirs::under(self.root.path(), VmType::Qemu))
    }
}
