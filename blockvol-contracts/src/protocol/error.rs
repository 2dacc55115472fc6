// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeErrorKind {
    InvalidInput,
    NotFound,
    /// Another attach/detach (or in-flight operation on the same key) holds the lock
    Aborted,
    /// The disk is mid-transition on the cloud side
    Busy,
    Timeout,
    /// The host device set after attach did not identify a single device
    Indeterminate,
    Cancelled,
    AttachedElsewhere,
    Unsupported,
    /// Host state is inconsistent (filesystem signatures, link targets, path shape)
    InvalidState,
    ToolFailed,
    Unavailable,
    Internal,
}

impl VolumeErrorKind {
    /// gRPC status code the protocol layer should answer with
    pub fn code(self) -> u16 {
        match self {
            Self::Cancelled => 1,
            Self::InvalidInput => 3,
            Self::Timeout => 4,
            Self::NotFound => 5,
            Self::AttachedElsewhere | Self::InvalidState => 9,
            Self::Aborted => 10,
            Self::Unsupported => 12,
            Self::ToolFailed | Self::Internal => 13,
            Self::Busy | Self::Indeterminate | Self::Unavailable => 14,
        }
    }

    /// Whether a caller retrying with backoff can expect a different outcome
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Aborted
                | Self::Busy
                | Self::Timeout
                | Self::Indeterminate
                | Self::Cancelled
                | Self::Unavailable
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct VolumeError {
    pub kind: VolumeErrorKind,
    pub message: String,
}

impl VolumeError {
    pub fn new(kind: VolumeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(VolumeErrorKind::NotFound, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(VolumeErrorKind::InvalidState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(VolumeErrorKind::Internal, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Keep the kind, prepend context to the message
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{context}: {}", self.message),
        }
    }
}

impl From<blockvol_types::DevicePathError> for VolumeError {
    fn from(err: blockvol_types::DevicePathError) -> Self {
        Self::new(VolumeErrorKind::InvalidInput, err.to_string())
    }
}
