// SPDX-License-Identifier: GPL-3.0-only

//! Attach/detach lifecycle against the cloud disk API
//!
//! Cloud state is only ever polled, never cached across calls. Every wait is
//! bounded by the configured retry count and interval. Host device reads run
//! on the blocking pool.

use std::sync::Arc;

use blockvol_contracts::{CloudDiskApi, HostDevices, VolumeError, VolumeErrorKind};
use blockvol_sys::DeviceRecordStore;
use blockvol_types::{Disk, DiskStatus, PollPolicy};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::inventory::{new_devices, select_new_device};
use crate::partition::PartitionAdapter;
use crate::resolver::DeviceResolver;
use crate::sequencing::{AttachMutex, AttachPermit};

/// Host-side device lookups, cheap to clone into a blocking task
#[derive(Clone)]
struct HostView {
    host: Arc<dyn HostDevices>,
    adapter: PartitionAdapter,
    resolver: Arc<DeviceResolver>,
    records: DeviceRecordStore,
}

impl HostView {
    /// Recorded device of `disk_id`, if it still exists and no other disk claims it
    fn recorded_device(&self, disk_id: &str) -> Option<String> {
        let device = self
            .records
            .lookup(disk_id)
            .filter(|device| self.host.exists(device))?;
        match self.records.claimed_by_other(&device, disk_id) {
            Ok(false) => Some(device),
            Ok(true) => {
                debug!(disk_id, device = %device, "recorded device belongs to another disk");
                None
            }
            Err(e) => {
                debug!(disk_id, "device records unavailable: {}", e);
                None
            }
        }
    }

    /// Device of a disk the cloud already reports as attached here
    fn attached_device(&self, disk_id: &str) -> Result<String, VolumeError> {
        let device = match self.resolver.resolve(disk_id) {
            Ok(device) => Some(device),
            Err(e) => {
                debug!(disk_id, error = %e, "falling back to device record");
                self.records.lookup(disk_id)
            }
        };

        let Some(device) = device.filter(|device| self.host.exists(device)) else {
            return Err(VolumeError::not_found(format!(
                "disk {disk_id} is attached to this node but its device cannot be found"
            )));
        };

        match self.records.claimed_by_other(&device, disk_id) {
            Ok(false) => {}
            Ok(true) => {
                return Err(VolumeError::not_found(format!(
                    "device {device} of disk {disk_id} is recorded for another disk"
                )));
            }
            Err(e) => debug!(disk_id, "device records unavailable: {}", e),
        }

        info!(disk_id, device = %device, "disk already attached to this node");
        Ok(device)
    }

    /// Device of a freshly attached disk: resolver, then record, then inventory diff
    fn new_device(&self, disk_id: &str, before: &[String]) -> Result<String, VolumeError> {
        let device = match self.resolver.resolve(disk_id) {
            Ok(device) => device,
            Err(e) => match self.recorded_device(disk_id) {
                Some(device) => {
                    info!(disk_id, device = %device, "device not resolved, using device record");
                    device
                }
                None => {
                    warn!(disk_id, error = %e, "device not resolved, diffing host devices");
                    let after = self.host.inventory();
                    let new = new_devices(before, &after);
                    debug!(disk_id, ?before, ?after, ?new, "inventory diff");
                    select_new_device(disk_id, &new, &self.adapter)?
                }
            },
        };

        if let Err(e) = self.records.record(disk_id, &device) {
            warn!(disk_id, device = %device, "failed to record device path: {}", e);
        }
        Ok(device)
    }
}

pub struct AttachCoordinator {
    config: Arc<DriverConfig>,
    cloud: Arc<dyn CloudDiskApi>,
    view: HostView,
    mutex: AttachMutex,
}

impl AttachCoordinator {
    pub fn new(
        config: Arc<DriverConfig>,
        cloud: Arc<dyn CloudDiskApi>,
        host: Arc<dyn HostDevices>,
        records: DeviceRecordStore,
        mutex: AttachMutex,
    ) -> Self {
        let adapter = PartitionAdapter::new(config.disk_partition, Arc::clone(&host));
        let resolver = Arc::new(DeviceResolver::standard(Arc::clone(&host), adapter.clone()));
        Self {
            config,
            cloud,
            view: HostView {
                host,
                adapter,
                resolver,
                records,
            },
            mutex,
        }
    }

    pub fn resolver(&self) -> &DeviceResolver {
        &self.view.resolver
    }

    /// Attach `disk_id` to instance `node_id`
    ///
    /// Returns the local device path on self-managed hosts and `None` when an
    /// external controller owns attachment.
    pub async fn attach(&self, disk_id: &str, node_id: &str) -> Result<Option<String>, VolumeError> {
        info!(disk_id, node_id, "attaching disk");
        if self.config.self_managed() && node_id != self.config.node_id {
            warn!(disk_id, node_id, local = %self.config.node_id, "self-managed attach for another node");
        }

        let disk = self
            .cloud
            .describe_volume(disk_id)
            .await?
            .ok_or_else(|| VolumeError::not_found(format!("disk {disk_id} not found")))?;

        let _permit = self.sequence(disk_id)?;

        match disk.status {
            DiskStatus::InUse => match disk.attached_instance() {
                Some(holder) if holder == node_id => {
                    if !self.config.self_managed() {
                        info!(disk_id, node_id, "disk already attached, skipping");
                        return Ok(None);
                    }
                    let id = disk_id.to_string();
                    return self
                        .on_host(disk_id, move |view| view.attached_device(&id))
                        .await
                        .map(Some);
                }
                Some(holder) => {
                    if !self.config.detach_before_attach {
                        return Err(VolumeError::new(
                            VolumeErrorKind::AttachedElsewhere,
                            format!(
                                "disk {disk_id} is attached to instance {holder} and force detach is disabled"
                            ),
                        ));
                    }
                    warn!(disk_id, holder, node_id, "force detaching disk from other instance");
                    self.cloud.detach_volume(disk_id, holder).await?;
                }
                None => debug!(disk_id, "disk in use without an instance"),
            },
            DiskStatus::Attaching => {
                return Err(VolumeError::new(
                    VolumeErrorKind::Busy,
                    format!("disk {disk_id} is attaching"),
                ));
            }
            _ => {}
        }

        if disk.status != DiskStatus::Available {
            info!(disk_id, status = %disk.status, "waiting for disk to become available");
            self.wait_for_status(disk_id, DiskStatus::Available, self.config.polling.wait_available)
                .await?;
        }

        let before = if self.config.self_managed() {
            self.on_host(disk_id, |view| Ok(view.host.inventory())).await?
        } else {
            Vec::new()
        };

        self.cloud.attach_volume(disk_id, node_id).await?;
        self.wait_for_status(disk_id, DiskStatus::InUse, self.config.polling.wait_in_use)
            .await?;
        info!(disk_id, node_id, "disk is in use");

        if !self.config.self_managed() {
            return Ok(None);
        }

        let id = disk_id.to_string();
        let device = self
            .on_host(disk_id, move |view| view.new_device(&id, &before))
            .await?;
        info!(disk_id, node_id, device = %device, "attached disk");
        Ok(Some(device))
    }

    /// Detach `disk_id` from instance `node_id`
    ///
    /// Missing disks, detached disks and disks held by other instances are
    /// all left alone and reported as success.
    pub async fn detach(&self, disk_id: &str, node_id: &str) -> Result<(), VolumeError> {
        let Some(disk) = self.cloud.describe_volume(disk_id).await? else {
            info!(disk_id, node_id, "disk not found, nothing to detach");
            self.forget(disk_id);
            return Ok(());
        };
        let Some(holder) = disk.attached_instance() else {
            info!(disk_id, "disk has no instance, nothing to detach");
            self.forget(disk_id);
            return Ok(());
        };
        if holder != node_id {
            info!(disk_id, holder, node_id, "disk attached to other instance, skipping detach");
            return Ok(());
        }

        let _permit = self.sequence(disk_id)?;
        info!(disk_id, node_id, "detaching disk");
        self.cloud.detach_volume(disk_id, node_id).await?;

        let policy = self.config.polling.wait_detached;
        for attempt in 1..=policy.retries {
            let Some(current) = self.cloud.describe_volume(disk_id).await? else {
                warn!(disk_id, "disk disappeared during detach");
                self.forget(disk_id);
                return Ok(());
            };
            if detach_settled(&current, node_id) {
                debug!(disk_id, status = %current.status, instance = ?current.attached_instance(), "detach settled");
                self.forget(disk_id);
                info!(disk_id, node_id, "detached disk");
                return Ok(());
            }
            if attempt < policy.retries {
                sleep(policy.interval()).await;
            }
        }

        Err(VolumeError::new(
            VolumeErrorKind::Timeout,
            format!(
                "detaching disk {disk_id} from {node_id} not settled after {} polls",
                policy.retries
            ),
        ))
    }

    /// Run a host device lookup off the async workers
    async fn on_host<T, F>(&self, disk_id: &str, f: F) -> Result<T, VolumeError>
    where
        T: Send + 'static,
        F: FnOnce(HostView) -> Result<T, VolumeError> + Send + 'static,
    {
        let view = self.view.clone();
        tokio::task::spawn_blocking(move || f(view))
            .await
            .map_err(|e| VolumeError::internal(format!("device lookup for {disk_id} failed: {e}")))?
    }

    fn sequence(&self, disk_id: &str) -> Result<Option<AttachPermit>, VolumeError> {
        if self.config.self_managed() {
            self.mutex.acquire_or_abort(disk_id).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Poll until the disk reports `want`; sleeps before every describe
    async fn wait_for_status(
        &self,
        disk_id: &str,
        want: DiskStatus,
        policy: PollPolicy,
    ) -> Result<Disk, VolumeError> {
        for attempt in 1..=policy.retries {
            sleep(policy.interval()).await;
            match self.cloud.describe_volume(disk_id).await? {
                Some(disk) if disk.status == want => return Ok(disk),
                Some(disk) => debug!(disk_id, attempt, status = %disk.status, want = %want, "disk not yet in status"),
                None => {
                    return Err(VolumeError::not_found(format!(
                        "disk {disk_id} disappeared while waiting for {want}"
                    )));
                }
            }
        }
        Err(VolumeError::new(
            VolumeErrorKind::Timeout,
            format!(
                "disk {disk_id} not {want} after {} polls",
                policy.retries
            ),
        ))
    }

    fn forget(&self, disk_id: &str) {
        if let Err(e) = self.view.records.forget(disk_id) {
            warn!(disk_id, "failed to remove device record: {}", e);
        }
    }
}

/// Whether a disk detached from `node_id` has stopped changing on its account
fn detach_settled(disk: &Disk, node_id: &str) -> bool {
    match disk.attached_instance() {
        None => true,
        Some(holder) if holder != node_id => true,
        Some(_) => matches!(
            disk.status,
            DiskStatus::Available | DiskStatus::InUse | DiskStatus::Attaching
        ),
    }
}
