// SPDX-License-Identifier: GPL-3.0-only

//! Attach/detach core for cloud block volumes
//!
//! [`BlockVolService`] is the entry point a protocol handler talks to. It owns
//! the process-wide [`InFlightTracker`] and [`AttachMutex`] and wires the
//! cloud, host and partition-tool seams into the components below:
//!
//! - [`AttachCoordinator`]: cloud attach/detach with bounded status polling
//! - [`DeviceResolver`]: disk id to local device path
//! - [`PartitionAdapter`]: single-partition layout validation
//! - [`PartitionExpander`]: online partition growth

pub mod attach;
pub mod config;
pub mod expand;
pub mod inflight;
pub mod inventory;
pub mod partition;
pub mod resolver;
pub mod sequencing;
pub mod service;

pub use attach::AttachCoordinator;
pub use config::{ConfigError, DriverConfig, HostPaths, Polling};
pub use expand::PartitionExpander;
pub use inflight::{InFlightGuard, InFlightTracker};
pub use partition::PartitionAdapter;
pub use resolver::{DeviceResolver, DeviceStrategy, NvmeStrategy, SerialStrategy, StableLinkStrategy};
pub use sequencing::{AttachMutex, AttachPermit};
pub use service::BlockVolService;
