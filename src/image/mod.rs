//! Boot disk acquisition.
//!
//! An [`ImagePuller`] makes a machine's disk image available at a local path.
//! Providers receive one in [`InitOptions`](crate::machine::InitOptions) and
//! call [`download`](ImagePuller::download) followed by
//! [`local_path`](ImagePuller::local_path).
//!
//! - [`NoopPuller`]: the source already is the local image
//! - [`CopyPuller`]: copies a local file into the machine data directory
//! - [`HttpPuller`]: fetches an `http(s)://` URI into the machine data directory

mod copy;
mod http;
mod noop;

pub use copy::CopyPuller;
pub use http::HttpPuller;
pub use noop::NoopPuller;

use crate::env::MachineDirs;
use crate::error::{Error, Result};
use crate::machine::config::VmType;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Strategy for making a boot disk image available locally.
pub trait ImagePuller: Send + std::fmt::Debug {
    /// Set where the image comes from.
    fn set_source_uri(&mut self, uri: &str);

    /// Path the image will have once downloaded.
    fn local_path(&self) -> Result<PathBuf>;

    /// Materialize the image at [`local_path`](ImagePuller::local_path).
    fn download(&self) -> Result<()>;
}

/// Destination of a materialized image for machine `name`.
pub fn local_image_path(dirs: &MachineDirs, name: &str, vm_type: VmType) -> PathBuf {
    dirs.data_dir.join(format!(
        "{}-{}{}",
        name,
        std::env::consts::ARCH,
        vm_type.image_extension()
    ))
}

/// Pick a puller for `source`: network URIs are fetched, anything else is
/// copied from the local filesystem.
pub fn puller_for_source(
    source: &str,
    vm_type: VmType,
    name: &str,
    dirs: &MachineDirs,
) -> Box<dyn ImagePuller> {
    let mut puller: Box<dyn ImagePuller> = if is_remote(source) {
        Box::new(HttpPuller::new(vm_type, name, dirs))
    } else {
        Box::new(CopyPuller::new(vm_type, name, dirs))
    };
    puller.set_source_uri(source);
    puller
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Check that a materialized image is a regular file the user can read and
/// write.
pub(crate) fn verify_image(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        Error::image(format!(
            "cannot get file information for {}: {}",
            path.display(),
            e
        ))
    })?;

    if !metadata.is_file() {
        return Err(Error::image(format!(
            "{} must be a regular file",
            path.display()
        )));
    }

    if !owner_can_read_write(&metadata) {
        return Err(Error::image(format!(
            "{} is not readable/writable by the user",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), "image verified");
    Ok(())
}

#[cfg(unix)]
fn owner_can_read_write(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o600 == 0o600
}

#[cfg(not(unix))]
fn owner_can_read_write(metadata: &Metadata) -> bool {
    !metadata.permissions().readonly()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_image_path_uses_type_extension() {
        let dirs = MachineDirs::under(Path::new("/m"), VmType::Qemu);
        let path = local_image_path(&dirs, "dev", VmType::Qemu);
        assert_eq!(
            path,
            PathBuf::from(format!("/m/data/qemu/dev-{}.qcow2", std::env::consts::ARCH))
        );

        let path = local_image_path(&dirs, "dev", VmType::Wsl);
        assert!(path.to_string_lossy().ends_with(std::env::consts::ARCH));
    }

    #[test]
    fn test_puller_for_source_picks_by_scheme() {
        let dirs = MachineDirs::under(Path::new("/m"), VmType::Qemu);
        let remote = puller_for_source("https://example.com/fedora.qcow2", VmType::Qemu, "dev", &dirs);
        assert!(format!("{:?}", remote).starts_with("HttpPuller"));

        let local = puller_for_source("/images/fedora.qcow2", VmType::Qemu, "dev", &dirs);
        assert!(format!("{:?}", local).starts_with("CopyPuller"));
    }

    #[test]
    fn test_verify_rejects_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = verify_image(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("regular file"));
    }

    #[test]
    fn test_verify_rejects_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = verify_image(&tmp.path().join("missing.raw")).unwrap_err();
        assert!(err.to_string().contains("cannot get file information"));
    }
}
