// SPDX-License-Identifier: GPL-3.0-only

//! Online partition growth
//!
//! The raw disk is held under an exclusive advisory lock for the whole call.
//! Only the table dump can be cancelled; once the resize has started it runs
//! to completion together with the kernel refresh.

use std::sync::Arc;

use blockvol_contracts::{PartitionTool, VolumeError, VolumeErrorKind};
use blockvol_sys::lock_exclusive;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Clone)]
pub struct PartitionExpander {
    tool: Arc<dyn PartitionTool>,
}

impl PartitionExpander {
    pub fn new(tool: Arc<dyn PartitionTool>) -> Self {
        Self { tool }
    }

    /// Grow partition `partition` of `disk` to the end of the disk
    pub async fn expand(
        &self,
        cancel: &CancellationToken,
        disk: &str,
        partition: u32,
    ) -> Result<(), VolumeError> {
        let device = disk.to_string();
        let lock = tokio::task::spawn_blocking(move || lock_exclusive(&device))
            .await
            .map_err(|e| VolumeError::internal(format!("lock task for {disk} failed: {e}")))??;

        let dump = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(VolumeError::new(
                    VolumeErrorKind::Cancelled,
                    format!("expanding partition {partition} on {disk} cancelled"),
                ));
            }
            dump = self.tool.dump(disk) => dump.map_err(|e| {
                e.context(format!("failed to dump partition table of {disk}"))
            })?,
        };
        debug!(disk, partition, table = %dump, "partition table before resize");

        // owns the lock, so dropping the caller's future does not interrupt it
        let tool = Arc::clone(&self.tool);
        let disk = disk.to_string();
        let resize = tokio::spawn(async move {
            let _lock = lock;
            if let Err(e) = tool.grow_partition(&disk, partition).await {
                return Err(VolumeError::new(
                    e.kind,
                    format!(
                        "failed to expand partition {partition} on {disk}: {}\noriginal table looked like:\n{dump}",
                        e.message
                    ),
                ));
            }
            tool.refresh_partition(&disk, partition)
                .await
                .map_err(|e| e.context(format!("failed to refresh partition {partition} on {disk}")))?;
            info!(disk = %disk, partition, "expanded partition");
            Ok(())
        });

        resize
            .await
            .map_err(|e| VolumeError::internal(format!("resize task failed: {e}")))?
    }
}
