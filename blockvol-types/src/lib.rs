// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for cloud block volumes
//!
//! These types are shared by every layer of the workspace:
//!
//! - **blockvol-contracts**: cloud, host and tool traits speak in these types
//! - **blockvol-sys**: host implementations produce them from sysfs and `/dev`
//! - **blockvol-service**: the attach/detach core reasons over them
//!
//! A [`Disk`] is only ever a snapshot of cloud-side state. Nothing in the workspace
//! keeps one around longer than the operation that fetched it.

pub mod device;
pub mod disk;
pub mod poll;

pub use device::{
    DEV_PREFIX, DevicePathError, FsSignature, StableLink, is_partition_of, make_device_path,
    split_root_and_index,
};
pub use disk::{DISK_ID_PREFIX, Disk, DiskStatus, disk_serial};
pub use poll::PollPolicy;
