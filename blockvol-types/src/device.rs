//! Host device path model
//!
//! A partition device is named by appending a decimal index to its root device
//! (`/dev/vdb` -> `/dev/vdb1`). Only that naming scheme is understood here.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory every block device path lives under
pub const DEV_PREFIX: &str = "/dev/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevicePathError {
    #[error("device path is empty or not under /dev: {0:?}")]
    NotADevice(String),

    #[error("device {path} has digits outside its trailing index")]
    MisplacedDigits { path: String },

    #[error("device {path} has an unparsable partition index {index}")]
    BadIndex { path: String, index: String },
}

/// Split a device path into its root device and partition index
///
/// `/dev/vdb` -> (`/dev/vdb`, None), `/dev/vdb22` -> (`/dev/vdb`, Some(22)).
/// A path whose digits are not a single trailing run (e.g. `/dev/nvme0n1`) is rejected.
pub fn split_root_and_index(path: &str) -> Result<(String, Option<u32>), DevicePathError> {
    let digit_runs = path
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .count();

    match digit_runs {
        0 => Ok((path.to_string(), None)),
        1 => {
            let root = path.trim_end_matches(|c: char| c.is_ascii_digit());
            let index = &path[root.len()..];
            if index.is_empty() {
                return Err(DevicePathError::MisplacedDigits {
                    path: path.to_string(),
                });
            }
            let parsed = index.parse().map_err(|_| DevicePathError::BadIndex {
                path: path.to_string(),
                index: index.to_string(),
            })?;
            Ok((root.to_string(), Some(parsed)))
        }
        _ => Err(DevicePathError::MisplacedDigits {
            path: path.to_string(),
        }),
    }
}

/// Whether `sub` is `root` extended by a purely decimal suffix
pub fn is_partition_of(root: &str, sub: &str) -> bool {
    sub.strip_prefix(root)
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}

/// Turn a bare device name (`vdb`) into a path under `/dev`
pub fn make_device_path(name: &str) -> String {
    if name.starts_with(DEV_PREFIX) {
        name.to_string()
    } else {
        Path::new(DEV_PREFIX).join(name).to_string_lossy().into_owned()
    }
}

/// Filesystem and partition-table signatures found on a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsSignature {
    /// Filesystem type, e.g. "ext4"
    pub fs_type: Option<String>,

    /// Partition table type, e.g. "gpt" or "dos"
    pub pt_type: Option<String>,
}

impl FsSignature {
    pub fn has_filesystem(&self) -> bool {
        self.fs_type.as_deref().is_some_and(|fs| !fs.is_empty())
    }
}

/// Outcome of looking up one entry in the stable-link directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StableLink {
    Missing,
    /// The entry exists but is a regular file or directory
    NotSymlink,
    /// Absolute, fully resolved link target
    Target(String),
}
