// SPDX-License-Identifier: GPL-3.0-only

//! Partition topology validation
//!
//! A disk is either used whole or through exactly one partition. When
//! partitioned, the partition carries the filesystem and the root device must
//! carry none.

use std::sync::Arc;

use blockvol_contracts::{HostDevices, VolumeError, VolumeErrorKind};
use blockvol_types::{DEV_PREFIX, DevicePathError, is_partition_of, split_root_and_index};
use tracing::{debug, info};

#[derive(Clone)]
pub struct PartitionAdapter {
    enabled: bool,
    host: Arc<dyn HostDevices>,
}

impl PartitionAdapter {
    pub fn new(enabled: bool, host: Arc<dyn HostDevices>) -> Self {
        Self { enabled, host }
    }

    /// Normalize `path` to the device that actually carries the filesystem
    ///
    /// Returns `path` unchanged when adaptation is disabled or the disk is not
    /// partitioned, and the partition device when the disk has a single one.
    pub fn adapt(&self, path: &str) -> Result<String, VolumeError> {
        if !self.enabled {
            return Ok(path.to_string());
        }
        if path.is_empty() || !path.starts_with(DEV_PREFIX) {
            return Err(DevicePathError::NotADevice(path.to_string()).into());
        }

        let (root, _) = split_root_and_index(path)?;
        let siblings: Vec<String> = self
            .host
            .devices_with_prefix(&root)?
            .into_iter()
            .filter(|device| device == &root || is_partition_of(&root, device))
            .collect();

        match siblings.len() {
            0 => Err(VolumeError::invalid_state(format!(
                "inconsistent enumeration: no device matches {root}*"
            ))),
            1 => Ok(path.to_string()),
            2 => {
                let sub = siblings
                    .iter()
                    .find(|device| **device != root)
                    .cloned()
                    .unwrap_or_else(|| siblings[0].clone());
                self.check_root_and_sub_device_fs(&root, &sub)?;
                info!(device = %path, partition = %sub, "using partition of partitioned disk");
                Ok(sub)
            }
            n => Err(VolumeError::new(
                VolumeErrorKind::Unsupported,
                format!("device {root} has {} partitions, only one is supported", n - 1),
            )),
        }
    }

    /// Verify `sub` is a filesystem-bearing partition of an unformatted `root`
    pub fn check_root_and_sub_device_fs(&self, root: &str, sub: &str) -> Result<(), VolumeError> {
        if !is_partition_of(root, sub) {
            return Err(VolumeError::invalid_state(format!(
                "input {sub} is not a sub device of {root}"
            )));
        }
        for device in [root, sub] {
            if !self.host.exists(device) {
                return Err(VolumeError::invalid_state(format!(
                    "device {device} does not exist"
                )));
            }
        }

        let root_signature = self.host.probe_signature(root)?;
        if root_signature.has_filesystem() {
            return Err(VolumeError::invalid_state(format!(
                "root device {root} has filesystem {}, expected none",
                root_signature.fs_type.as_deref().unwrap_or_default()
            )));
        }
        let sub_signature = self.host.probe_signature(sub)?;
        if !sub_signature.has_filesystem() {
            return Err(VolumeError::invalid_state(format!(
                "partition {sub} has no filesystem"
            )));
        }

        debug!(root, sub, fs_type = ?sub_signature.fs_type, "partition layout verified");
        Ok(())
    }
}
