// SPDX-License-Identifier: GPL-3.0-only

pub mod cloud;
pub mod host;
pub mod partition;

pub use cloud::CloudDiskApi;
pub use host::HostDevices;
pub use partition::PartitionTool;
