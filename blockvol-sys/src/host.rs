// SPDX-License-Identifier: GPL-3.0-only

//! sysfs and `/dev` backed implementation of [`HostDevices`]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use blockvol_contracts::{HostDevices, VolumeError, VolumeErrorKind};
use blockvol_types::{FsSignature, StableLink};
use tracing::{debug, warn};

use crate::probe::probe_signature;

/// Inventory only counts virtio disks, matching what cloud attach produces
const INVENTORY_PREFIX: &str = "vd";

/// Host device view rooted at configurable directories
#[derive(Debug, Clone)]
pub struct SysfsHost {
    dev_dir: PathBuf,
    sys_block_dir: PathBuf,
    by_id_dir: PathBuf,
}

impl Default for SysfsHost {
    fn default() -> Self {
        Self::new("/dev", "/sys/block", "/dev/disk/by-id")
    }
}

impl SysfsHost {
    pub fn new(
        dev_dir: impl Into<PathBuf>,
        sys_block_dir: impl Into<PathBuf>,
        by_id_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            sys_block_dir: sys_block_dir.into(),
            by_id_dir: by_id_dir.into(),
        }
    }

    fn device_path(&self, name: &str) -> String {
        self.dev_dir.join(name).to_string_lossy().into_owned()
    }

    /// `(block device name, trimmed contents of <sys_block>/<name>/<attribute>)`
    fn read_block_attribute(&self, attribute: &str) -> Vec<(String, String)> {
        let entries = match fs::read_dir(&self.sys_block_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("List block devices in {:?} failed: {}", self.sys_block_dir, e);
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let attribute_path = entry.path().join(attribute);
            match fs::read_to_string(&attribute_path) {
                Ok(body) => found.push((name, body.trim().to_string())),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Read {:?}: {}", attribute_path, e),
            }
        }
        found.sort();
        found
    }
}

impl HostDevices for SysfsHost {
    fn device_serials(&self) -> Vec<(String, String)> {
        self.read_block_attribute("serial")
            .into_iter()
            .filter(|(_, serial)| !serial.is_empty())
            .map(|(name, serial)| (self.device_path(&name), serial))
            .collect()
    }

    fn nvme_volume_ids(&self) -> Vec<(String, String)> {
        self.read_block_attribute("device/serial")
            .into_iter()
            .filter(|(name, id)| name.starts_with("nvme") && !id.is_empty())
            .map(|(name, id)| (self.device_path(&name), id))
            .collect()
    }

    fn stable_links(&self) -> Result<Vec<String>, VolumeError> {
        match fs::read_dir(&self.by_id_dir) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .flatten()
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                Ok(names)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(VolumeError::internal(format!(
                "list {}: {e}",
                self.by_id_dir.display()
            ))),
        }
    }

    fn read_stable_link(&self, name: &str) -> Result<StableLink, VolumeError> {
        let link = self.by_id_dir.join(name);
        let metadata = match fs::symlink_metadata(&link) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StableLink::Missing),
            Err(e) => {
                return Err(VolumeError::internal(format!(
                    "error getting stat of {:?}: {e}",
                    link
                )));
            }
        };
        if !metadata.file_type().is_symlink() {
            return Ok(StableLink::NotSymlink);
        }

        // /dev/disk/by-id/virtio-wz9cu3ctp6aj1iagco4h -> ../../vdc
        let resolved = fs::canonicalize(&link).map_err(|e| {
            VolumeError::invalid_state(format!("error reading target of symlink {:?}: {e}", link))
        })?;
        Ok(StableLink::Target(resolved.to_string_lossy().into_owned()))
    }

    fn devices_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VolumeError> {
        let prefix_path = Path::new(prefix);
        let (Some(dir), Some(stem)) = (prefix_path.parent(), prefix_path.file_name()) else {
            return Err(VolumeError::new(
                VolumeErrorKind::InvalidInput,
                format!("cannot list devices for prefix {prefix:?}"),
            ));
        };
        let stem = stem.to_string_lossy();

        let entries = fs::read_dir(dir).map_err(|e| {
            VolumeError::internal(format!("list devices for {prefix} with error {e}"))
        })?;
        let mut devices: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(stem.as_ref()))
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        devices.sort();
        debug!(prefix, ?devices, "listed devices by prefix");
        Ok(devices)
    }

    fn exists(&self, device: &str) -> bool {
        Path::new(device).exists()
    }

    fn probe_signature(&self, device: &str) -> Result<FsSignature, VolumeError> {
        probe_signature(device).map_err(VolumeError::from)
    }

    fn inventory(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dev_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("List devices in {:?} failed: {}", self.dev_dir, e);
                return Vec::new();
            }
        };
        let mut devices: Vec<String> = entries
            .flatten()
            .filter(|entry| !entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(INVENTORY_PREFIX)
            })
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        devices.sort();
        devices
    }
}
