use super::{local_image_path, verify_image, ImagePuller};
use crate::env::MachineDirs;
use crate::error::{Error, Result};
use crate::machine::config::VmType;
use std::path::{Path, PathBuf};

/// Puller that copies a local image file into the machine data directory.
#[derive(Debug, Clone)]
pub struct CopyPuller {
    source: PathBuf,
    destination: PathBuf,
}

impl CopyPuller {
    /// Create a puller for machine `name`. The destination extension follows
    /// `vm_type`.
    pub fn new(vm_type: VmType, name: &str, dirs: &MachineDirs) -> Self {
        Self {
            source: PathBuf::new(),
            destination: local_image_path(dirs, name, vm_type),
        }
    }
}

impl ImagePuller for CopyPuller {
    fn set_source_uri(&mut self, uri: &str) {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        self.source = PathBuf::from(path);
    }

    fn local_path(&self) -> Result<PathBuf> {
        Ok(self.destination.clone())
    }

    fn download(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::image("no source image given"));
        }
        if !self.source.exists() {
            return Err(Error::ImageNotFound {
                path: self.source.clone(),
            });
        }

        if let Some(parent) = self.destination.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if same_file(&self.source, &self.destination) {
            tracing::debug!(path = %self.destination.display(), "image already in place");
        } else {
            tracing::info!(
                source = %self.source.display(),
                dest = %self.destination.display(),
                "copying disk image"
            );
            std::fs::copy(&self.source, &self.destination)?;
        }

        verify_image(&self.destination)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
