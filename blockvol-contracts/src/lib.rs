// SPDX-License-Identifier: GPL-3.0-only

//! Seams between the attach/detach core and the world around it
//!
//! Everything the core cannot own itself sits behind a trait here so tests can
//! substitute it: the cloud disk API, host device inspection, and the external
//! partition-table tool.

pub mod protocol;
pub mod traits;

pub use protocol::{VolumeError, VolumeErrorKind};
pub use traits::{CloudDiskApi, HostDevices, PartitionTool};
