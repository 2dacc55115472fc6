// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use blockvol_types::Disk;

use crate::VolumeError;

/// Cloud-side disk API
///
/// Request construction, signing and parameter validation live in the
/// implementation. The core only needs these four calls.
#[async_trait]
pub trait CloudDiskApi: Send + Sync {
    /// Current snapshot of a disk, or `None` when the cloud no longer knows it
    async fn describe_volume(&self, disk_id: &str) -> Result<Option<Disk>, VolumeError>;

    async fn attach_volume(&self, disk_id: &str, instance_id: &str) -> Result<(), VolumeError>;

    async fn detach_volume(&self, disk_id: &str, instance_id: &str) -> Result<(), VolumeError>;

    /// Create a disk and return its id
    async fn create_volume(
        &self,
        region_id: &str,
        disk_type: &str,
        size_gb: u64,
    ) -> Result<String, VolumeError>;
}
