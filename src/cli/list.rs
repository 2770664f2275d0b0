//! List command implementation.

use super::Context;
use clap::{Args, ValueEnum};
use macadam::{LifecycleState, MachineConfig, VmProvider};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Output format for `list`.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// Aligned columns.
    #[default]
    Table,
    /// JSON array.
    Json,
}

/// List machines.
#[derive(Args, Debug)]
pub struct ListCmd {
    /// Output format.
    #[arg(long, value_enum, default_value_t = ListFormat::Table)]
    pub format: ListFormat,
}

/// One machine as reported by `list --format json`.
#[derive(Serialize, Debug)]
struct ListEntry {
    name: String,
    vm_type: String,
    image: PathBuf,
    created: String,
    last_up: Option<String>,
    #[serde(skip)]
    last_up_at: Option<SystemTime>,
    state: LifecycleState,
    running: bool,
    starting: bool,
    cpus: u64,
    memory_mib: u64,
    disk_size_gib: u64,
    port: u16,
    remote_username: String,
    identity_path: PathBuf,
}

impl ListEntry {
    fn new(config: &MachineConfig, state: LifecycleState) -> Self {
        Self {
            name: config.name.clone(),
            vm_type: config.vm_type.to_string(),
            image: config.image_path.clone(),
            created: humantime::format_rfc3339_seconds(config.created).to_string(),
            last_up: config
                .last_up
                .map(|t| humantime::format_rfc3339_seconds(t).to_string()),
            last_up_at: config.last_up,
            state,
            running: state == LifecycleState::Running,
            starting: config.starting || state == LifecycleState::Starting,
            cpus: config.resources.cpus,
            memory_mib: config.resources.memory_mib,
            disk_size_gib: config.resources.disk_size_gib,
            port: config.ssh.port,
            remote_username: config.ssh.remote_username.clone(),
            identity_path: config.ssh.identity_path.clone(),
        }
    }
}

impl ListCmd {
    /// Execute the list command.
    pub fn run(&self, ctx: &Context) -> macadam::Result<()> {
        let provider = ctx.provider();
        let entries = list_entries(provider, provider.list()?);

        if self.format == ListFormat::Json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!("No machines found");
            return Ok(());
        }

        println!(
            "{:<30} {:<10} {:<6} {:<10} {:<8} {:<8} {:<20}",
            "NAME", "STATE", "CPUS", "MEMORY", "DISK", "SSH", "LAST UP"
        );
        println!("{}", "-".repeat(96));

        for entry in &entries {
            let last_up = if entry.running {
                "currently running".to_string()
            } else {
                match entry.last_up_at {
                    Some(t) => ago(t, SystemTime::now()),
                    None => "never".to_string(),
                }
            };

            println!(
                "{:<30} {:<10} {:<6} {:<10} {:<8} {:<8} {:<20}",
                entry.name,
                entry.state.name(),
                entry.cpus,
                format!("{} MiB", entry.memory_mib),
                format!("{} GiB", entry.disk_size_gib),
                entry.port,
                last_up,
            );
        }

        Ok(())
    }
}

/// One entry per machine record. A machine whose state cannot be read is
/// reported in the error state.
fn list_entries(provider: &dyn VmProvider, configs: Vec<MachineConfig>) -> Vec<ListEntry> {
    configs
        .iter()
        .map(|config| {
            let state = match provider.state(config, false) {
                Ok(status) => status.into(),
                Err(e) => {
                    tracing::warn!(machine = %config.name, error = %e, "failed to get machine state");
                    LifecycleState::Error
                }
            };
            ListEntry::new(config, state)
        })
        .collect()
}

/// Time elapsed since `t`, rounded to whole seconds.
fn ago(t: SystemTime, now: SystemTime) -> String {
    let elapsed = now.duration_since(t).unwrap_or_default();
    format!(
        "{} ago",
        humantime::format_duration(Duration::from_secs(elapsed.as_secs()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_unreadable_machine_does_not_abort_listing() {
        use macadam::machine::backend::QemuProvider;
        use macadam::machine::config::InitOptions;

        let tmp = tempfile::tempdir().unwrap();
        let provider = QemuProvider::with_root(tmp.path());
        let image = tmp.path().join("fedora.raw");
        std::fs::write(&image, b"disk").unwrap();

        provider
            .init(InitOptions {
                name: "dev".to_string(),
                cpus: 2,
                memory_mib: 2048,
                image,
                ..Default::default()
            })
            .unwrap();

        let mut configs = provider.list().unwrap();
        let dev = configs[0].clone();

        let mut gone = dev.clone();
        gone.name = "gone".to_string();
        configs.push(gone);

        let mut broken = dev.clone();
        broken.name = "broken".to_string();
        let record = provider.directories().unwrap().config_dir.join("broken.json");
        std::fs::write(record, b"{").unwrap();
        configs.push(broken);

        let entries = list_entries(&provider, configs);
        let states: Vec<(&str, LifecycleState)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.state))
            .collect();
        assert_eq!(
            states,
            vec![
                ("dev", LifecycleState::Stopped),
                ("gone", LifecycleState::Error),
                ("broken", LifecycleState::Error),
            ]
        );
        assert_eq!(entries[0].cpus, 2);
        assert!(!entries[0].running);
    }

    #[test]
    fn test_ago_rounds_to_seconds() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10_000);
        let t = now - Duration::from_millis(3_723_400);
        assert_eq!(ago(t, now), "1h 2m 3s ago");
    }

    #[test]
    fn test_ago_in_the_future_is_zero() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let t = now + Duration::from_secs(5);
        assert_eq!(ago(t, now), "0s ago");
    }
}
