use std::{io, path::PathBuf, process::ExitStatus, time::Duration};
use thiserror::Error;

use crate::models::ContainerName;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid build spec: {0}")]
    Configuration(String),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("unexpected output from `{command}`: {reason}")]
    InvalidOutput { command: String, reason: String },

    #[error("reading random bytes for a container name")]
    Randomness(#[source] rand::Error),

    #[error("timed out after {timeout:?} waiting for network connectivity in {container}")]
    Timeout {
        container: ContainerName,
        timeout: Duration,
    },

    #[error("command {command:?} failed in container {container}")]
    Provisioning {
        container: ContainerName,
        command: String,
        #[source]
        source: Box<Error>,
    },

    #[error("expected a single tarball, found {found} ({names:?})")]
    UnexpectedExport { found: usize, names: Vec<String> },

    #[error("cannot derive an image fingerprint from {0:?}")]
    InvalidExportName(String),

    #[error("unhandled compression type in tarball: {}", .0.display())]
    UnsupportedCompression(PathBuf),

    #[error("no metadata.yaml in {}", .0.display())]
    MissingMetadata(PathBuf),

    #[error("invalid metadata.yaml: {0}")]
    InvalidMetadata(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True for failures to invoke the container runtime or to make sense of what it printed.
    pub fn is_runtime_invocation(&self) -> bool {
        matches!(
            self,
            Error::Spawn { .. } | Error::CommandFailed { .. } | Error::InvalidOutput { .. }
        )
    }

    pub fn is_archive_format(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedExport { .. }
                | Error::InvalidExportName(_)
                | Error::UnsupportedCompression(_)
                | Error::MissingMetadata(_)
                | Error::InvalidMetadata(_)
        )
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::InvalidMetadata(err.to_string())
    }
}
