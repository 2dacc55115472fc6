// SPDX-License-Identifier: GPL-3.0-only

use blockvol_contracts::{VolumeError, VolumeErrorKind};
use thiserror::Error;

/// Error types for host-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to lock {path} exclusively: {source}")]
    Lock {
        path: String,
        #[source]
        source: nix::Error,
    },
}

impl From<SysError> for VolumeError {
    fn from(err: SysError) -> Self {
        let kind = match &err {
            SysError::DeviceNotFound(_) => VolumeErrorKind::NotFound,
            SysError::ToolNotFound(_) => VolumeErrorKind::Unavailable,
            SysError::CommandFailed { .. } | SysError::Lock { .. } => VolumeErrorKind::ToolFailed,
            SysError::Io(_) => VolumeErrorKind::Internal,
        };
        VolumeError::new(kind, err.to_string())
    }
}

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, SysError>;
