// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use blockvol_contracts::{CloudDiskApi, HostDevices, PartitionTool, VolumeError, VolumeErrorKind};
use blockvol_sys::DeviceRecordStore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::attach::AttachCoordinator;
use crate::config::DriverConfig;
use crate::expand::PartitionExpander;
use crate::inflight::{InFlightGuard, InFlightTracker};
use crate::sequencing::AttachMutex;

/// Process-lifetime owner of the in-flight set, the attach mutex and the
/// components built on them
pub struct BlockVolService {
    config: Arc<DriverConfig>,
    in_flight: InFlightTracker,
    mutex: AttachMutex,
    coordinator: AttachCoordinator,
    expander: PartitionExpander,
}

impl BlockVolService {
    pub fn new(
        config: DriverConfig,
        cloud: Arc<dyn CloudDiskApi>,
        host: Arc<dyn HostDevices>,
        tool: Arc<dyn PartitionTool>,
        records: DeviceRecordStore,
    ) -> Self {
        let config = Arc::new(config);
        let mutex = AttachMutex::new();
        let coordinator = AttachCoordinator::new(
            Arc::clone(&config),
            cloud,
            host,
            records,
            mutex.clone(),
        );
        info!(
            node_id = %config.node_id,
            self_managed = config.self_managed(),
            force_detach = config.detach_before_attach,
            partitions = config.disk_partition,
            "block volume service ready"
        );
        Self {
            config,
            in_flight: InFlightTracker::new(),
            mutex,
            coordinator,
            expander: PartitionExpander::new(tool),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    pub fn attach_mutex(&self) -> &AttachMutex {
        &self.mutex
    }

    /// Claim `key` for the duration of one operation
    pub fn begin_operation(&self, key: &str) -> Result<InFlightGuard, VolumeError> {
        self.in_flight.try_guard(key).ok_or_else(|| {
            VolumeError::new(
                VolumeErrorKind::Aborted,
                format!("There is already an operation for {key}"),
            )
        })
    }

    /// Attach `disk_id` to instance `node_id`, returning the local device on
    /// self-managed hosts
    pub async fn attach(&self, disk_id: &str, node_id: &str) -> Result<Option<String>, VolumeError> {
        let _guard = self.begin_operation(disk_id)?;
        self.coordinator.attach(disk_id, node_id).await
    }

    pub async fn detach(&self, disk_id: &str, node_id: &str) -> Result<(), VolumeError> {
        let _guard = self.begin_operation(disk_id)?;
        self.coordinator.detach(disk_id, node_id).await
    }

    pub async fn expand_partition(
        &self,
        cancel: &CancellationToken,
        disk: &str,
        partition: u32,
    ) -> Result<(), VolumeError> {
        self.expander.expand(cancel, disk, partition).await
    }

    pub fn resolve(&self, disk_id: &str) -> Result<String, VolumeError> {
        self.coordinator.resolver().resolve(disk_id)
    }
}
