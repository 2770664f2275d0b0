//! QEMU provider.
//!
//! Machine records are JSON files under the config directory. A running
//! machine is a daemonized `qemu-system-<arch>` process tracked by a pid file
//! in the runtime directory.

use crate::env::MachineDirs;
use crate::error::{Error, Result};
use crate::image::{ImagePuller, NoopPuller};
use crate::machine::config::{
    InitOptions, MachineConfig, MachineResources, RemoveOptions, SetOptions, SshAccess,
    StartOptions, VmType,
};
use crate::machine::identity::validate_name;
use crate::machine::provider::VmProvider;
use crate::machine::state::ProviderStatus;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant, SystemTime};

/// Time allowed for a graceful shutdown before SIGKILL.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between liveness checks while stopping.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// fw_cfg key under which Fedora CoreOS looks for its Ignition config.
const IGNITION_FW_CFG: &str = "opt/com.coreos/config";

/// Provider that runs machines as daemonized QEMU processes.
#[derive(Debug, Clone)]
pub struct QemuProvider {
    binary: PathBuf,
    dirs: MachineDirs,
}

impl QemuProvider {
    /// Create a provider using the default machine directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnavailable`] if `qemu-system-<arch>` is not on
    /// `PATH`.
    pub fn new() -> Result<Self> {
        let name = qemu_binary_name();
        let binary = crate::util::find_in_path(&name)
            .ok_or_else(|| Error::ProviderUnavailable(format!("{} not found in PATH", name)))?;

        Ok(Self {
            binary,
            dirs: MachineDirs::for_vm_type(VmType::Qemu)?,
        })
    }

    /// Create a provider that keeps all of its state under `root`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            binary: PathBuf::from(qemu_binary_name()),
            dirs: MachineDirs::under(root, VmType::Qemu),
        }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dirs.config_dir.join(format!("{}.json", name))
    }

    fn ignition_path(&self, name: &str) -> PathBuf {
        self.dirs.config_dir.join(format!("{}.ign", name))
    }

    fn pid_path(&self, name: &str) -> PathBuf {
        self.dirs.runtime_dir.join(format!("{}.pid", name))
    }

    fn load_record(&self, name: &str) -> Result<Option<MachineConfig>> {
        let path = self.record_path(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn require_record(&self, name: &str) -> Result<MachineConfig> {
        self.load_record(name)?
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn save_record(&self, config: &MachineConfig) -> Result<()> {
        std::fs::create_dir_all(&self.dirs.config_dir)?;

        let mut file = tempfile::NamedTempFile::new_in(&self.dirs.config_dir)?;
        serde_json::to_writer_pretty(file.as_file_mut(), config)?;
        file.as_file_mut().flush()?;
        file.persist(self.record_path(&config.name))
            .map_err(|e| Error::Io(e.error))?;

        tracing::debug!(machine = %config.name, "saved machine record");
        Ok(())
    }

    /// Pid of the machine's QEMU process, if one is alive.
    fn running_pid(&self, name: &str) -> Option<libc::pid_t> {
        pidfile_owner(&self.pid_path(name))
    }

    fn ensure_stopped(&self, name: &str) -> Result<()> {
        if self.running_pid(name).is_some() {
            return Err(Error::InvalidState {
                expected: "stopped".to_string(),
                actual: "running".to_string(),
            });
        }
        Ok(())
    }

    fn in_data_dir(&self, path: &Path) -> bool {
        path.starts_with(&self.dirs.data_dir)
    }
}

impl VmProvider for QemuProvider {
    fn vm_type(&self) -> VmType {
        VmType::Qemu
    }

    fn exists(&self, name: &str) -> Result<Option<MachineConfig>> {
        self.load_record(name)
    }

    fn list(&self) -> Result<Vec<MachineConfig>> {
        let entries = match std::fs::read_dir(&self.dirs.config_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut machines = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load_record(name) {
                Ok(Some(config)) => machines.push(config),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable machine record");
                }
            }
        }

        machines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(machines)
    }

    fn init(&self, opts: InitOptions) -> Result<()> {
        validate_name(&opts.name)?;
        if self.load_record(&opts.name)?.is_some() {
            return Err(Error::AlreadyExists(opts.name));
        }
        self.dirs.ensure()?;

        let puller: Box<dyn ImagePuller> = match opts.image_puller {
            Some(puller) => puller,
            None => Box::new(NoopPuller::new(opts.image.clone())),
        };
        puller.download()?;
        let image_path = puller.local_path()?;

        if self.in_data_dir(&image_path) && opts.disk_size_gib > 0 {
            resize_image(&image_path, opts.disk_size_gib)?;
        }

        if let Some(ignition) = &opts.ignition_path {
            std::fs::copy(ignition, self.ignition_path(&opts.name))?;
        }
        if !opts.usbs.is_empty() {
            tracing::warn!(
                machine = %opts.name,
                count = opts.usbs.len(),
                "usb passthrough is not supported by the qemu provider, ignoring"
            );
        }

        let port = free_local_port()?;
        let config = MachineConfig {
            name: opts.name,
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
                port,
            },
            volumes: opts.volumes,
            timezone: opts.timezone,
            rootful: opts.rootful,
            user_mode_networking: opts.user_mode_networking,
            created: SystemTime::now(),
            last_up: None,
            starting: false,
        };
        self.save_record(&config)?;

        tracing::info!(machine = %config.name, ssh_port = port, "machine initialized");
        Ok(())
    }

    fn start(
        &self,
        config: &MachineConfig,
        dirs: &MachineDirs,
        opts: &StartOptions,
    ) -> Result<()> {
        self.ensure_stopped(&config.name)?;
        std::fs::create_dir_all(&dirs.runtime_dir)?;

        let mut record = self.require_record(&config.name)?;
        record.starting = true;
        self.save_record(&record)?;

        let ignition = self.ignition_path(&record.name);
        let ignition = ignition.is_file().then_some(ignition.as_path());
        let args = qemu_args(&record, &self.pid_path(&record.name), ignition);
        tracing::debug!(machine = %record.name, args = ?args, "launching qemu");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| Error::command_failed(self.binary.display().to_string(), e.to_string()));

        record.starting = false;
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                self.save_record(&record)?;
                return Err(e);
            }
        };

        if !output.status.success() {
            self.save_record(&record)?;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::command_failed(
                self.binary.display().to_string(),
                stderr.trim(),
            ));
        }

        record.last_up = Some(SystemTime::now());
        self.save_record(&record)?;

        if !opts.quiet {
            tracing::info!(machine = %record.name, ssh_port = record.ssh.port, "qemu started");
        }
        Ok(())
    }

    fn stop(&self, config: &MachineConfig, _dirs: &MachineDirs, hard: bool) -> Result<()> {
        let pid_file = self.pid_path(&config.name);

        let Some(pid) = self.running_pid(&config.name) else {
            let _ = std::fs::remove_file(&pid_file);
            tracing::debug!(machine = %config.name, "machine not running");
            return Ok(());
        };

        let signal = if hard { libc::SIGKILL } else { libc::SIGTERM };
        tracing::info!(machine = %config.name, pid, hard, "stopping machine");

        if unsafe { libc::kill(pid, signal) } == 0 {
            let start = Instant::now();
            while pidfile_owner(&pid_file) == Some(pid) {
                if start.elapsed() > STOP_TIMEOUT {
                    tracing::warn!(machine = %config.name, pid, "graceful stop timed out, sending SIGKILL");
                    unsafe { libc::kill(pid, libc::SIGKILL) };
                    std::thread::sleep(Duration::from_millis(500));
                    break;
                }
                std::thread::sleep(STOP_POLL_INTERVAL);
            }
        }

        let _ = std::fs::remove_file(&pid_file);

        if let Some(mut record) = self.load_record(&config.name)? {
            if record.starting {
                record.starting = false;
                self.save_record(&record)?;
            }
        }

        Ok(())
    }

    fn remove(
        &self,
        config: &MachineConfig,
        dirs: &MachineDirs,
        opts: &RemoveOptions,
    ) -> Result<()> {
        if self.running_pid(&config.name).is_some() {
            if !opts.force {
                return Err(Error::InvalidState {
                    expected: "stopped".to_string(),
                    actual: "running".to_string(),
                });
            }
            self.stop(config, dirs, true)?;
        }

        let record = self.load_record(&config.name)?.unwrap_or_else(|| config.clone());

        remove_if_exists(&self.record_path(&record.name))?;
        remove_if_exists(&self.pid_path(&record.name))?;
        remove_if_exists(&self.ignition_path(&record.name))?;

        if !opts.save_image && self.in_data_dir(&record.image_path) {
            remove_if_exists(&record.image_path)?;
        }

        tracing::info!(machine = %record.name, "machine removed");
        Ok(())
    }

    fn set(&self, config: &MachineConfig, opts: &SetOptions) -> Result<()> {
        self.ensure_stopped(&config.name)?;
        let mut record = self.require_record(&config.name)?;

        if let Some(cpus) = opts.cpus {
            record.resources.cpus = cpus;
        }
        if let Some(memory_mib) = opts.memory_mib {
            record.resources.memory_mib = memory_mib;
        }
        if let Some(disk_size_gib) = opts.disk_size_gib {
            let current = record.resources.disk_size_gib;
            if disk_size_gib < current {
                return Err(Error::Config(format!(
                    "disk size can only grow: current {} GiB, requested {} GiB",
                    current, disk_size_gib
                )));
            }
            if disk_size_gib > current {
                resize_image(&record.image_path, disk_size_gib)?;
                record.resources.disk_size_gib = disk_size_gib;
            }
        }

        self.save_record(&record)
    }

    fn state(&self, config: &MachineConfig, _force_refresh: bool) -> Result<ProviderStatus> {
        let Some(record) = self.load_record(&config.name)? else {
            return Ok(ProviderStatus::Unknown);
        };

        if self.running_pid(&record.name).is_some() {
            Ok(ProviderStatus::Running)
        } else if record.starting {
            Ok(ProviderStatus::Starting)
        } else {
            Ok(ProviderStatus::Stopped)
        }
    }

    fn directories(&self) -> Result<MachineDirs> {
        Ok(self.dirs.clone())
    }
}

fn qemu_binary_name() -> String {
    format!("qemu-system-{}", std::env::consts::ARCH)
}

fn accelerator() -> &'static str {
    if cfg!(target_os = "linux") {
        "kvm"
    } else if cfg!(target_os = "macos") {
        "hvf"
    } else {
        "tcg"
    }
}

fn machine_type() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "virt"
    } else {
        "q35"
    }
}

/// Disk format QEMU should use for an image, from its extension.
fn disk_format(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("qcow2") => "qcow2",
        _ => "raw",
    }
}

/// Command line for a daemonized QEMU process.
fn qemu_args(config: &MachineConfig, pid_file: &Path, ignition: Option<&Path>) -> Vec<String> {
    let accel = accelerator();
    let cpu = if accel == "tcg" { "max" } else { "host" };

    let mut args: Vec<String> = vec![
        "-name".into(),
        config.name.clone(),
        "-machine".into(),
        machine_type().into(),
        "-accel".into(),
        accel.into(),
        "-cpu".into(),
        cpu.into(),
        "-m".into(),
        config.resources.memory_mib.to_string(),
        "-smp".into(),
        config.resources.cpus.to_string(),
        "-drive".into(),
        format!(
            "if=virtio,file={},format={}",
            config.image_path.display(),
            disk_format(&config.image_path)
        ),
        "-netdev".into(),
        format!(
            "user,id=net0,hostfwd=tcp:127.0.0.1:{}-:22",
            config.ssh.port
        ),
        "-device".into(),
        "virtio-net-pci,netdev=net0".into(),
    ];

    for (i, volume) in config.volumes.iter().enumerate() {
        let source = volume.split(':').next().unwrap_or(volume);
        args.push("-virtfs".into());
        args.push(format!(
            "local,path={},mount_tag=vol{},security_model=none",
            source, i
        ));
    }

    if let Some(ignition) = ignition {
        args.push("-fw_cfg".into());
        args.push(format!("name={},file={}", IGNITION_FW_CFG, ignition.display()));
    }

    args.extend([
        "-display".into(),
        "none".into(),
        "-daemonize".into(),
        "-pidfile".into(),
        pid_file.display().to_string(),
    ]);

    args
}

fn resize_image(path: &Path, size_gib: u64) -> Result<()> {
    tracing::info!(image = %path.display(), size_gib, "resizing disk image");

    let output = Command::new("qemu-img")
        .arg("resize")
        .arg(path)
        .arg(format!("{}G", size_gib))
        .output()
        .map_err(|e| Error::command_failed("qemu-img resize", e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::command_failed("qemu-img resize", stderr.trim()));
    }

    Ok(())
}

fn free_local_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Pid of the process holding the lock on a QEMU pid file.
///
/// QEMU locks its `-pidfile` for as long as it runs and the lock goes away
/// with the process, so a stale file whose pid was reused has no owner.
fn pidfile_owner(path: &Path) -> Option<libc::pid_t> {
    let file = std::fs::File::open(path).ok()?;

    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = libc::F_WRLCK as libc::c_short;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    // l_start = 0 and l_len = 0 cover the whole file
    if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETLK, &mut lock as *mut libc::flock) } != 0 {
        return None;
    }

    // 0 and negative values address process groups
    if lock.l_type == libc::F_UNLCK as libc::c_short || lock.l_pid <= 0 {
        return None;
    }
    Some(lock.l_pid)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use tempfile::TempDir;

    fn setup() -> (TempDir, QemuProvider, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let provider = QemuProvider::with_root(tmp.path());
        let image = tmp.path().join("fedora.raw");
        std::fs::write(&image, b"disk").unwrap();
        (tmp, provider, image)
    }

    fn init_opts(name: &str, image: &Path) -> InitOptions {
        InitOptions {
            name: name.to_string(),
            cpus: 2,
            memory_mib: 2048,
            disk_size_gib: 20,
            username: "core".to_string(),
            image: image.to_path_buf(),
            ..Default::default()
        }
    }

    fn init(provider: &QemuProvider, name: &str, image: &Path) -> MachineConfig {
        provider.init(init_opts(name, image)).unwrap();
        provider.exists(name).unwrap().unwrap()
    }

    /// Child process that locks the machine's pid file the way QEMU does.
    struct FakeQemu {
        pid: libc::pid_t,
    }

    impl FakeQemu {
        fn spawn(provider: &QemuProvider, name: &str) -> Self {
            std::fs::create_dir_all(&provider.dirs.runtime_dir).unwrap();
            let path = provider.pid_path(name);
            std::fs::write(&path, b"").unwrap();
            let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();

            let mut lock: libc::flock = unsafe { std::mem::zeroed() };
            lock.l_type = libc::F_WRLCK as libc::c_short;
            lock.l_whence = libc::SEEK_SET as libc::c_short;

            let mut fds = [0; 2];
            assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);

            let pid = unsafe { libc::fork() };
            assert!(pid >= 0);
            if pid == 0 {
                // async-signal-safe calls only until exit
                unsafe {
                    let fd = libc::open(c_path.as_ptr(), libc::O_RDWR);
                    if fd < 0 || libc::fcntl(fd, libc::F_SETLKW, &lock as *const libc::flock) != 0
                    {
                        libc::_exit(1);
                    }
                    libc::write(fds[1], b"x".as_ptr().cast(), 1);
                    loop {
                        libc::pause();
                    }
                }
            }

            let mut buf = [0u8; 1];
            let n = unsafe {
                libc::close(fds[1]);
                let n = libc::read(fds[0], buf.as_mut_ptr().cast(), 1);
                libc::close(fds[0]);
                n
            };
            let qemu = Self { pid };
            assert_eq!(n, 1, "fake qemu could not lock its pid file");

            std::fs::write(&path, pid.to_string()).unwrap();
            qemu
        }
    }

    impl Drop for FakeQemu {
        fn drop(&mut self) {
            unsafe {
                libc::kill(self.pid, libc::SIGKILL);
                libc::waitpid(self.pid, std::ptr::null_mut(), 0);
            }
        }
    }

    #[test]
    fn test_init_persists_record() {
        let (_tmp, provider, image) = setup();
        let before = SystemTime::now();

        let config = init(&provider, "dev", &image);

        assert_eq!(config.vm_type, VmType::Qemu);
        assert_eq!(config.image_path, image);
        assert_eq!(config.resources.cpus, 2);
        assert_eq!(config.resources.memory_mib, 2048);
        assert_eq!(config.resources.disk_size_gib, 20);
        assert_eq!(config.ssh.remote_username, "core");
        assert_ne!(config.ssh.port, 0);
        assert!(config.created >= before);
        assert!(config.last_up.is_none());
        assert!(provider.record_path("dev").is_file());
    }

    #[test]
    fn test_init_twice_is_already_exists() {
        let (_tmp, provider, image) = setup();
        init(&provider, "dev", &image);

        let err = provider.init(init_opts("dev", &image)).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(ref name) if name == "dev"));
    }

    #[test]
    fn test_init_rejects_path_like_names() {
        let (_tmp, provider, image) = setup();
        let err = provider.init(init_opts("../escape", &image)).unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));
    }

    #[test]
    fn test_init_copies_ignition() {
        let (tmp, provider, image) = setup();
        let ignition = tmp.path().join("config.ign");
        std::fs::write(&ignition, b"{}").unwrap();

        let opts = InitOptions {
            ignition_path: Some(ignition),
            ..init_opts("dev", &image)
        };
        provider.init(opts).unwrap();

        assert!(provider.ignition_path("dev").is_file());
    }

    #[test]
    fn test_list_machines() {
        let (_tmp, provider, image) = setup();
        assert!(provider.list().unwrap().is_empty());

        init(&provider, "web", &image);
        init(&provider, "db", &image);
        std::fs::write(provider.dirs.config_dir.join("notes.txt"), b"x").unwrap();
        std::fs::write(provider.dirs.config_dir.join("broken.json"), b"{").unwrap();

        let names: Vec<String> = provider.list().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["db".to_string(), "web".to_string()]);
    }

    #[test]
    fn test_missing_machine() {
        let (_tmp, provider, image) = setup();
        assert!(provider.exists("ghost").unwrap().is_none());

        let mut config = init(&provider, "dev", &image);
        config.name = "ghost".to_string();
        assert_eq!(provider.state(&config, false).unwrap(), ProviderStatus::Unknown);
    }

    #[test]
    fn test_state_reports_record_and_process() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);
        assert_eq!(provider.state(&config, false).unwrap(), ProviderStatus::Stopped);

        let mut starting = config.clone();
        starting.starting = true;
        provider.save_record(&starting).unwrap();
        assert_eq!(provider.state(&config, true).unwrap(), ProviderStatus::Starting);

        let _qemu = FakeQemu::spawn(&provider, "dev");
        assert_eq!(provider.state(&config, false).unwrap(), ProviderStatus::Running);
    }

    #[test]
    fn test_garbage_pid_file_is_not_running() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);

        std::fs::create_dir_all(&provider.dirs.runtime_dir).unwrap();
        for contents in ["", "abc", "0", "-1"] {
            std::fs::write(provider.pid_path("dev"), contents).unwrap();
            assert_eq!(provider.state(&config, false).unwrap(), ProviderStatus::Stopped);
        }
    }

    #[test]
    fn test_unlocked_pid_file_is_not_running() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);
        let dirs = provider.directories().unwrap();

        // a live process that is not qemu, as after pid reuse
        std::fs::create_dir_all(&provider.dirs.runtime_dir).unwrap();
        std::fs::write(provider.pid_path("dev"), std::process::id().to_string()).unwrap();

        assert_eq!(provider.state(&config, false).unwrap(), ProviderStatus::Stopped);
        provider.stop(&config, &dirs, true).unwrap();
        assert!(!provider.pid_path("dev").exists());
    }

    #[test]
    fn test_stop_terminates_running_machine() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);
        let dirs = provider.directories().unwrap();

        let qemu = FakeQemu::spawn(&provider, "dev");
        assert_eq!(provider.running_pid("dev"), Some(qemu.pid));
        assert_eq!(provider.state(&config, false).unwrap(), ProviderStatus::Running);

        provider.stop(&config, &dirs, false).unwrap();

        assert!(!provider.pid_path("dev").exists());
        assert_eq!(provider.state(&config, false).unwrap(), ProviderStatus::Stopped);
    }

    #[test]
    fn test_stop_when_not_running() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);
        let dirs = provider.directories().unwrap();

        provider.stop(&config, &dirs, false).unwrap();
        provider.stop(&config, &dirs, true).unwrap();
    }

    #[test]
    fn test_set_updates_cpu_and_memory() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);

        let opts = SetOptions {
            cpus: Some(6),
            memory_mib: Some(8192),
            disk_size_gib: Some(20),
        };
        provider.set(&config, &opts).unwrap();

        let updated = provider.exists("dev").unwrap().unwrap();
        assert_eq!(updated.resources.cpus, 6);
        assert_eq!(updated.resources.memory_mib, 8192);
        assert_eq!(updated.resources.disk_size_gib, 20);
        assert_eq!(updated.created, config.created);
    }

    #[test]
    fn test_set_refuses_disk_shrink() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);

        let opts = SetOptions {
            disk_size_gib: Some(10),
            ..Default::default()
        };
        assert!(matches!(provider.set(&config, &opts), Err(Error::Config(_))));
        assert_eq!(provider.exists("dev").unwrap().unwrap(), config);
    }

    #[test]
    fn test_set_refuses_running_machine() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);
        let _qemu = FakeQemu::spawn(&provider, "dev");

        let opts = SetOptions {
            cpus: Some(8),
            ..Default::default()
        };
        assert!(matches!(
            provider.set(&config, &opts),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_remove_refuses_running_machine_without_force() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);
        let dirs = provider.directories().unwrap();
        let _qemu = FakeQemu::spawn(&provider, "dev");

        let err = provider
            .remove(&config, &dirs, &RemoveOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert!(provider.exists("dev").unwrap().is_some());
    }

    #[test]
    fn test_remove_keeps_images_outside_data_dir() {
        let (_tmp, provider, image) = setup();
        let config = init(&provider, "dev", &image);
        let dirs = provider.directories().unwrap();

        provider
            .remove(&config, &dirs, &RemoveOptions::default())
            .unwrap();

        assert!(provider.exists("dev").unwrap().is_none());
        assert!(image.is_file());
    }

    #[test]
    fn test_remove_deletes_owned_image_unless_saved() {
        let (_tmp, provider, _) = setup();
        let dirs = provider.directories().unwrap();
        dirs.ensure().unwrap();

        let owned = dirs.data_dir.join("dev.raw");
        std::fs::write(&owned, b"disk").unwrap();
        // zero size skips qemu-img
        let opts = InitOptions {
            disk_size_gib: 0,
            ..init_opts("dev", &owned)
        };
        provider.init(opts).unwrap();
        let config = provider.exists("dev").unwrap().unwrap();

        let keep = RemoveOptions {
            save_image: true,
            ..Default::default()
        };
        provider.remove(&config, &dirs, &keep).unwrap();
        assert!(owned.is_file());

        let opts = InitOptions {
            disk_size_gib: 0,
            ..init_opts("dev", &owned)
        };
        provider.init(opts).unwrap();
        provider
            .remove(&config, &dirs, &RemoveOptions::default())
            .unwrap();
        assert!(!owned.exists());
    }

    #[test]
    fn test_qemu_args() {
        let (tmp, provider, image) = setup();
        let mut config = init(&provider, "dev", &image);
        config.volumes = vec!["/home/core/src:/src".to_string()];
        let pid_file = tmp.path().join("dev.pid");

        let args = qemu_args(&config, &pid_file, None);
        let joined = args.join(" ");

        assert!(joined.contains("-m 2048"));
        assert!(joined.contains("-smp 2"));
        assert!(joined.contains(&format!("hostfwd=tcp:127.0.0.1:{}-:22", config.ssh.port)));
        assert!(joined.contains("format=raw"));
        assert!(joined.contains("path=/home/core/src,mount_tag=vol0"));
        assert!(joined.contains("-daemonize"));
        assert!(joined.ends_with(&format!("-pidfile {}", pid_file.display())));
        assert!(!joined.contains("-fw_cfg"));

        let ignition = tmp.path().join("dev.ign");
        let args = qemu_args(&config, &pid_file, Some(&ignition));
        assert!(args.join(" ").contains(IGNITION_FW_CFG));
    }

    #[test]
    fn test_disk_format_from_extension() {
        assert_eq!(disk_format(Path::new("/d/dev.qcow2")), "qcow2");
        assert_eq!(disk_format(Path::new("/d/dev.raw")), "raw");
        assert_eq!(disk_format(Path::new("/d/dev")), "raw");
    }
}
