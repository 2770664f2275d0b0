use super::ImagePuller;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Puller for an image that is already where the machine will use it.
#[derive(Debug, Clone, Default)]
pub struct NoopPuller {
    local_path: PathBuf,
}

impl NoopPuller {
    /// Create a puller for an existing local image.
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
        }
    }
}

impl ImagePuller for NoopPuller {
    fn set_source_uri(&mut self, uri: &str) {
        self.local_path = PathBuf::from(uri);
    }

    fn local_path(&self) -> Result<PathBuf> {
        if self.local_path.as_os_str().is_empty() {
            return Err(Error::image("no disk image given"));
        }
        Ok(self.local_path.clone())
    }

    fn download(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_is_local_path() {
        let mut puller = NoopPuller::default();
        puller.set_source_uri("/images/fedora.raw");
        assert_eq!(puller.local_path().unwrap(), PathBuf::from("/images/fedora.raw"));
        assert!(puller.download().is_ok());
    }

    #[test]
    fn test_unset_source_is_an_error() {
        assert!(NoopPuller::default().local_path().is_err());
    }
}
