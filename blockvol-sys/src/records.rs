// SPDX-License-Identifier: GPL-3.0-only

//! Per-disk device-path records kept on the host
//!
//! One `<disk id>.conf` file per disk, holding nothing but the device path.
//! The records are a cache: they can be stale and are never authoritative.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::Result;

const RECORD_SUFFIX: &str = ".conf";

#[derive(Debug, Clone)]
pub struct DeviceRecordStore {
    dir: PathBuf,
}

impl Default for DeviceRecordStore {
    fn default() -> Self {
        Self::new("/host/etc/kubernetes/volumes/disk")
    }
}

impl DeviceRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self, disk_id: &str) -> PathBuf {
        self.dir.join(format!("{disk_id}{RECORD_SUFFIX}"))
    }

    /// Last recorded device path for `disk_id`, if any
    pub fn lookup(&self, disk_id: &str) -> Option<String> {
        let path = self.record_path(disk_id);
        match fs::read_to_string(&path) {
            Ok(body) => {
                let device = body.trim();
                (!device.is_empty()).then(|| device.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Read device record {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn record(&self, disk_id: &str, device: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.record_path(disk_id), device)?;
        debug!(disk_id, device, "recorded device path");
        Ok(())
    }

    pub fn forget(&self, disk_id: &str) -> Result<()> {
        match fs::remove_file(self.record_path(disk_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a record for a different disk points at `device`
    pub fn claimed_by_other(&self, device: &str, disk_id: &str) -> Result<bool> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(other) = name.to_string_lossy().strip_suffix(RECORD_SUFFIX).map(str::to_owned)
            else {
                continue;
            };
            if other != disk_id && self.lookup(&other).as_deref() == Some(device) {
                debug!(device, disk_id, claimed_by = %other, "device is recorded for another disk");
                return Ok(true);
            }
        }
        Ok(false)
    }
}
