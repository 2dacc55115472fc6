// SPDX-License-Identifier: GPL-3.0-only

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use blockvol_contracts::{CloudDiskApi, VolumeError};
use blockvol_types::Disk;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    Describe(String),
    Attach { disk_id: String, instance_id: String },
    Detach { disk_id: String, instance_id: String },
    Create { region_id: String, disk_type: String, size_gb: u64 },
}

#[derive(Default)]
struct CloudState {
    script: VecDeque<Option<Disk>>,
    last: Option<Disk>,
    calls: Vec<CloudCall>,
    attach_error: Option<VolumeError>,
    detach_error: Option<VolumeError>,
    created: u32,
}

/// Cloud disk API answering `describe_volume` from a script
///
/// Each describe pops the next scripted snapshot; once the script runs out the
/// last snapshot keeps being returned.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<CloudState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe always answers with `disk`
    pub fn with_disk(disk: Disk) -> Self {
        Self::scripted([Some(disk)])
    }

    pub fn scripted(snapshots: impl IntoIterator<Item = Option<Disk>>) -> Self {
        let cloud = Self::default();
        cloud.lock().script.extend(snapshots);
        cloud
    }

    pub fn then_describe(&self, snapshot: Option<Disk>) {
        self.lock().script.push_back(snapshot);
    }

    pub fn fail_attach(&self, error: VolumeError) {
        self.lock().attach_error = Some(error);
    }

    pub fn fail_detach(&self, error: VolumeError) {
        self.lock().detach_error = Some(error);
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.lock().calls.clone()
    }

    pub fn describe_count(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::Describe(_)))
    }

    pub fn attach_count(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::Attach { .. }))
    }

    pub fn detach_count(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::Detach { .. }))
    }

    fn count(&self, pred: impl Fn(&CloudCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| pred(call)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CloudDiskApi for FakeCloud {
    async fn describe_volume(&self, disk_id: &str) -> Result<Option<Disk>, VolumeError> {
        let mut state = self.lock();
        state.calls.push(CloudCall::Describe(disk_id.to_string()));
        if let Some(next) = state.script.pop_front() {
            state.last = next;
        }
        Ok(state.last.clone())
    }

    async fn attach_volume(&self, disk_id: &str, instance_id: &str) -> Result<(), VolumeError> {
        let mut state = self.lock();
        state.calls.push(CloudCall::Attach {
            disk_id: disk_id.to_string(),
            instance_id: instance_id.to_string(),
        });
        match state.attach_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn detach_volume(&self, disk_id: &str, instance_id: &str) -> Result<(), VolumeError> {
        let mut state = self.lock();
        state.calls.push(CloudCall::Detach {
            disk_id: disk_id.to_string(),
            instance_id: instance_id.to_string(),
        });
        match state.detach_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn create_volume(
        &self,
        region_id: &str,
        disk_type: &str,
        size_gb: u64,
    ) -> Result<String, VolumeError> {
        let mut state = self.lock();
        state.calls.push(CloudCall::Create {
            region_id: region_id.to_string(),
            disk_type: disk_type.to_string(),
            size_gb,
        });
        state.created += 1;
        Ok(format!("d-fake{:04}", state.created))
    }
}
