// SPDX-License-Identifier: GPL-3.0-only

use blockvol_types::{FsSignature, StableLink};

use crate::VolumeError;

/// Read-only view of the host's block devices
///
/// All paths handed in and out are absolute device paths (`/dev/vdb`). None of
/// these calls mutate the host.
pub trait HostDevices: Send + Sync {
    /// Block devices that report a hardware serial, as `(device path, serial)`
    fn device_serials(&self) -> Vec<(String, String)>;

    /// NVMe namespaces with the volume id their controller embeds, as `(device path, id)`
    fn nvme_volume_ids(&self) -> Vec<(String, String)>;

    /// Entry names in the stable-link directory (`/dev/disk/by-id`)
    fn stable_links(&self) -> Result<Vec<String>, VolumeError>;

    fn read_stable_link(&self, name: &str) -> Result<StableLink, VolumeError>;

    /// Device paths starting with `prefix`, the prefix itself included when present
    fn devices_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VolumeError>;

    fn exists(&self, device: &str) -> bool;

    /// Filesystem and partition-table signatures on a device
    fn probe_signature(&self, device: &str) -> Result<FsSignature, VolumeError>;

    /// Current set of candidate disk devices, used to diff before/after an attach
    fn inventory(&self) -> Vec<String>;
}
