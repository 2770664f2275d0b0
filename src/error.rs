//! Error types for macadam.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using macadam's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in macadam operations.
#[derive(Error, Debug)]
pub enum Error {
    // Machine lifecycle errors
    /// A machine with this name already exists.
    #[error("{0}: machine already exists")]
    AlreadyExists(String),

    /// Machine name rejected by identity validation.
    #[error("invalid machine name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Machine not found.
    #[error("machine not found: {0}")]
    NotFound(String),

    /// Operation needs a loaded machine configuration and none is cached.
    #[error("machine {0} is not initialized: no configuration loaded")]
    Uninitialized(String),

    /// Machine is in an invalid state for the requested operation.
    #[error("invalid machine state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state.
        expected: String,
        /// Actual state.
        actual: String,
    },

    // Backend errors
    /// A provider or image puller call failed.
    #[error("{operation} failed for machine {machine}: {source}")]
    Backend {
        /// Lifecycle operation that was running.
        operation: &'static str,
        /// Machine the operation targeted.
        machine: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// No VM provider could be resolved for this host.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Unknown virtualization type name.
    #[error("unknown vm type: {0}")]
    InvalidVmType(String),

    // Image errors
    /// Disk image is missing or unusable.
    #[error("image error: {0}")]
    Image(String),

    /// Disk image not found.
    #[error("image not found: {}", path.display())]
    ImageNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// Network fetch of a disk image failed.
    #[error("download failed: {0}")]
    Download(String),

    // Configuration errors
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to load configuration.
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Failed to save configuration.
    #[error("failed to save config: {0}")]
    ConfigSave(String),

    /// Malformed serialized payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Command execution errors
    /// External command failed.
    #[error("command failed: {command}: {message}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// Error message.
        message: String,
    },

    // IO errors
    /// IO error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a provider or puller failure with the operation and machine name.
    pub fn backend(operation: &'static str, machine: impl Into<String>, source: Error) -> Self {
        Self::Backend {
            operation,
            machine: machine.into(),
            source: Box::new(source),
        }
    }

    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an image error with a message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Whether this error (or the backend failure it wraps) means the machine
    /// already exists.
    ///
    /// Callers of `create` commonly treat this as "nothing to do".
    pub fn is_already_exists(&self) -> bool {
        match self {
            Error::AlreadyExists(_) => true,
            Error::Backend { source, .. } => source.is_already_exists(),
            _ => false,
        }
    }
}
