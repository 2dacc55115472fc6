// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use crate::VolumeError;

/// External partition-table tool
///
/// Failures carry the tool's stderr in the error message. Implementations must
/// stop the underlying process when a `dump` future is dropped, and must never
/// abandon a `resize` half way.
#[async_trait]
pub trait PartitionTool: Send + Sync {
    /// Textual dump of the current partition table
    async fn dump(&self, disk: &str) -> Result<String, VolumeError>;

    /// Grow `partition` over all trailing free space without telling the kernel
    async fn grow_partition(&self, disk: &str, partition: u32) -> Result<String, VolumeError>;

    /// Ask the kernel to re-read only `partition` of `disk`
    async fn refresh_partition(&self, disk: &str, partition: u32) -> Result<String, VolumeError>;
}
