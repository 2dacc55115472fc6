// SPDX-License-Identifier: GPL-3.0-only

//! Exclusive advisory locks on raw block devices
//!
//! `sfdisk(8)` asks callers that edit a partition table to hold `flock(LOCK_EX)`
//! on the whole-disk device so udev and other well-behaved tools stay away.

use std::fs::{File, OpenOptions};

use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::{Result, SysError};

/// An open, exclusively locked device handle
///
/// The lock is tied to the open file description: dropping the value closes the
/// handle and releases the lock, and so does the process dying.
pub struct DeviceLock {
    path: String,
    _handle: Flock<File>,
}

impl DeviceLock {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for DeviceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLock").field("path", &self.path).finish()
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        debug!(device = %self.path, "releasing exclusive device lock");
    }
}

/// Open `device` read-only and block until an exclusive `flock` is granted
pub fn lock_exclusive(device: &str) -> Result<DeviceLock> {
    let file = OpenOptions::new().read(true).open(device).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SysError::DeviceNotFound(device.to_string())
        } else {
            SysError::Io(e)
        }
    })?;

    let handle = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
        SysError::Lock {
            path: device.to_string(),
            source: errno,
        }
    })?;
    debug!(device, "acquired exclusive device lock");

    Ok(DeviceLock {
        path: device.to_string(),
        _handle: handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let held = lock_exclusive(&path).unwrap();
        assert_eq!(held.path(), path);

        let probe = OpenOptions::new().read(true).open(&path).unwrap();
        let contended = Flock::lock(probe, FlockArg::LockExclusiveNonblock);
        assert!(contended.is_err());

        drop(held);
        let probe = OpenOptions::new().read(true).open(&path).unwrap();
        assert!(Flock::lock(probe, FlockArg::LockExclusiveNonblock).is_ok());
    }

    #[test]
    fn missing_device_is_reported() {
        let err = lock_exclusive("/nonexistent/blockvol-device").unwrap_err();
        assert!(matches!(err, SysError::DeviceNotFound(_)));
    }
}
