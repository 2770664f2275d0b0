use super::{local_image_path, verify_image, ImagePuller};
use crate::env::MachineDirs;
use crate::error::{Error, Result};
use crate::machine::config::VmType;
use std::io::Write;
use std::path::PathBuf;

/// User agent sent with image downloads.
const USER_AGENT: &str = concat!("macadam/", env!("CARGO_PKG_VERSION"));

/// Puller that fetches an image over HTTP(S) into the machine data directory.
#[derive(Debug, Clone)]
pub struct HttpPuller {
    source_uri: String,
    destination: PathBuf,
}

impl HttpPuller {
    /// Create a puller for machine `name`. The destination extension follows
    /// `vm_type`.
    pub fn new(vm_type: VmType, name: &str, dirs: &MachineDirs) -> Self {
        Self {
            source_uri: String::new(),
            destination: local_image_path(dirs, name, vm_type),
        }
    }
}

impl ImagePuller for HttpPuller {
    fn set_source_uri(&mut self, uri: &str) {
        self.source_uri = uri.to_string();
    }

    fn local_path(&self) -> Result<PathBuf> {
        Ok(self.destination.clone())
    }

    fn download(&self) -> Result<()> {
        if self.source_uri.is_empty() {
            return Err(Error::image("no source image given"));
        }

        let parent = self
            .destination
            .parent()
            .ok_or_else(|| Error::image("image destination has no parent directory"))?;
        std::fs::create_dir_all(parent)?;

        tracing::info!(
            uri = %self.source_uri,
            dest = %self.destination.display(),
            "downloading disk image"
        );

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(None)
            .build()
            .map_err(|e| Error::Download(e.to_string()))?;

        let mut response = client
            .get(&self.source_uri)
            .send()
            .map_err(|e| Error::Download(format!("{}: {}", self.source_uri, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!(
                "{} (HTTP {})",
                self.source_uri, status
            )));
        }

        // A failed transfer must not leave a truncated image at the destination.
        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        let bytes = response
            .copy_to(file.as_file_mut())
            .map_err(|e| Error::Download(format!("{}: {}", self.source_uri, e)))?;
        file.as_file_mut().flush()?;
        file.persist(&self.destination)
            .map_err(|e| Error::Io(e.error))?;

        tracing::debug!(bytes, "download complete");
        verify_image(&self.destination)
    }
}
