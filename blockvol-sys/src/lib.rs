// SPDX-License-Identifier: GPL-3.0-only

//! Low-level host operations for cloud block volumes
//!
//! This crate talks to the Linux host directly:
//! - sysfs and `/dev` enumeration (serials, NVMe records, stable links)
//! - filesystem signature probing via `blkid`
//! - exclusive advisory locks on raw devices
//! - `sfdisk`/`partx` invocation for online partition growth
//! - the per-disk device-path records kept on the host
//!
//! These operations need root and should only be called from the node service.

pub mod error;
pub mod host;
pub mod lock;
pub mod probe;
pub mod records;
pub mod sfdisk;

pub use error::{Result, SysError};
pub use host::SysfsHost;
pub use lock::{DeviceLock, lock_exclusive};
pub use probe::{parse_blkid_export, probe_signature};
pub use records::DeviceRecordStore;
pub use sfdisk::Sfdisk;
