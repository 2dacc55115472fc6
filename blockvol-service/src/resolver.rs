// SPDX-License-Identifier: GPL-3.0-only

//! Disk id to host device path resolution
//!
//! Strategies run in order and the first hit wins. A strategy that finds a
//! device but cannot validate it stops the chain with an error instead of
//! letting a later strategy guess.

use std::sync::Arc;

use blockvol_contracts::{HostDevices, VolumeError};
use blockvol_types::{DEV_PREFIX, StableLink, disk_serial};
use tracing::{debug, info};

use crate::partition::PartitionAdapter;

/// Stable links for virtio disks are named `virtio-<serial>`
const STABLE_LINK_PREFIX: &str = "virtio-";

pub trait DeviceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` hands over to the next strategy
    fn locate(&self, disk_id: &str) -> Result<Option<String>, VolumeError>;
}

/// Match the disk serial against `/sys/block/*/serial`
pub struct SerialStrategy {
    host: Arc<dyn HostDevices>,
    adapter: PartitionAdapter,
}

impl SerialStrategy {
    pub fn new(host: Arc<dyn HostDevices>, adapter: PartitionAdapter) -> Self {
        Self { host, adapter }
    }
}

impl DeviceStrategy for SerialStrategy {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn locate(&self, disk_id: &str) -> Result<Option<String>, VolumeError> {
        let serial = disk_serial(disk_id);
        let Some((device, _)) = self
            .host
            .device_serials()
            .into_iter()
            .find(|(_, candidate)| candidate == serial)
        else {
            return Ok(None);
        };

        self.adapter
            .adapt(&device)
            .map(Some)
            .map_err(|e| e.context(format!("adapt partition of {device} for disk {disk_id}")))
    }
}

/// NVMe namespaces report the full volume id in their controller serial
pub struct NvmeStrategy {
    host: Arc<dyn HostDevices>,
}

impl NvmeStrategy {
    pub fn new(host: Arc<dyn HostDevices>) -> Self {
        Self { host }
    }
}

impl DeviceStrategy for NvmeStrategy {
    fn name(&self) -> &'static str {
        "nvme"
    }

    fn locate(&self, disk_id: &str) -> Result<Option<String>, VolumeError> {
        Ok(self
            .host
            .nvme_volume_ids()
            .into_iter()
            .find(|(_, volume_id)| volume_id == disk_id)
            .map(|(device, _)| device))
    }
}

/// Follow `/dev/disk/by-id/virtio-<serial>`
pub struct StableLinkStrategy {
    host: Arc<dyn HostDevices>,
    adapter: PartitionAdapter,
}

impl StableLinkStrategy {
    pub fn new(host: Arc<dyn HostDevices>, adapter: PartitionAdapter) -> Self {
        Self { host, adapter }
    }

    /// Expected link name first, then any entry mentioning the serial
    fn find_link(&self, serial: &str) -> Result<Option<(String, StableLink)>, VolumeError> {
        let expected = format!("{STABLE_LINK_PREFIX}{serial}");
        match self.host.read_stable_link(&expected)? {
            StableLink::Missing => {}
            link => return Ok(Some((expected, link))),
        }

        for name in self.host.stable_links()? {
            if !name.contains(serial) {
                continue;
            }
            match self.host.read_stable_link(&name)? {
                StableLink::Missing => continue,
                link => {
                    debug!(link = %name, "found stable link by serial scan");
                    return Ok(Some((name, link)));
                }
            }
        }
        Ok(None)
    }
}

impl DeviceStrategy for StableLinkStrategy {
    fn name(&self) -> &'static str {
        "stable-link"
    }

    fn locate(&self, disk_id: &str) -> Result<Option<String>, VolumeError> {
        let Some((name, link)) = self.find_link(disk_serial(disk_id))? else {
            return Ok(None);
        };

        let target = match link {
            StableLink::Target(target) => target,
            StableLink::NotSymlink => {
                return Err(VolumeError::invalid_state(format!(
                    "stable link {name} for disk {disk_id} is not a symlink"
                )));
            }
            StableLink::Missing => return Ok(None),
        };
        if !target.starts_with(DEV_PREFIX) {
            return Err(VolumeError::invalid_state(format!(
                "stable link {name} points outside /dev: {target}"
            )));
        }

        self.adapter
            .adapt(&target)
            .map(Some)
            .map_err(|e| e.context(format!("adapt partition of {target} for disk {disk_id}")))
    }
}

pub struct DeviceResolver {
    strategies: Vec<Box<dyn DeviceStrategy>>,
}

impl DeviceResolver {
    pub fn new(strategies: Vec<Box<dyn DeviceStrategy>>) -> Self {
        Self { strategies }
    }

    /// Serial, then NVMe identity, then stable link
    pub fn standard(host: Arc<dyn HostDevices>, adapter: PartitionAdapter) -> Self {
        Self::new(vec![
            Box::new(SerialStrategy::new(Arc::clone(&host), adapter.clone())),
            Box::new(NvmeStrategy::new(Arc::clone(&host))),
            Box::new(StableLinkStrategy::new(host, adapter)),
        ])
    }

    pub fn resolve(&self, disk_id: &str) -> Result<String, VolumeError> {
        for strategy in &self.strategies {
            if let Some(device) = strategy.locate(disk_id)? {
                info!(disk_id, device = %device, strategy = strategy.name(), "resolved device");
                return Ok(device);
            }
            debug!(disk_id, strategy = strategy.name(), "no device found");
        }
        Err(VolumeError::not_found(format!(
            "device for disk {disk_id} is unresolved"
        )))
    }
}
