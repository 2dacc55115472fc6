// SPDX-License-Identifier: GPL-3.0-only

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use blockvol_contracts::{HostDevices, VolumeError};
use blockvol_types::{FsSignature, StableLink};

#[derive(Default)]
struct HostState {
    devices: BTreeSet<String>,
    serials: Vec<(String, String)>,
    nvme: Vec<(String, String)>,
    links: BTreeMap<String, StableLink>,
    signatures: HashMap<String, FsSignature>,
    inventories: VecDeque<Vec<String>>,
    last_inventory: Option<Vec<String>>,
}

/// In-memory host with a fixed set of device nodes
///
/// `inventory` answers from a script when one is set (sticky on its last entry),
/// otherwise with every known `/dev/vd*` device.
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, device: &str) -> Self {
        self.add_device(device);
        self
    }

    pub fn with_filesystem(self, device: &str, fs_type: &str) -> Self {
        self.lock()
            .signatures
            .entry(device.to_string())
            .or_default()
            .fs_type = Some(fs_type.to_string());
        self.with_device(device)
    }

    pub fn with_partition_table(self, device: &str, pt_type: &str) -> Self {
        self.lock()
            .signatures
            .entry(device.to_string())
            .or_default()
            .pt_type = Some(pt_type.to_string());
        self.with_device(device)
    }

    pub fn with_serial(self, device: &str, serial: &str) -> Self {
        self.lock()
            .serials
            .push((device.to_string(), serial.to_string()));
        self.with_device(device)
    }

    pub fn with_nvme(self, device: &str, volume_id: &str) -> Self {
        self.lock()
            .nvme
            .push((device.to_string(), volume_id.to_string()));
        self.with_device(device)
    }

    pub fn with_link(self, name: &str, link: StableLink) -> Self {
        self.lock().links.insert(name.to_string(), link);
        self
    }

    pub fn with_inventories(self, inventories: impl IntoIterator<Item = Vec<&'static str>>) -> Self {
        self.lock().inventories.extend(
            inventories
                .into_iter()
                .map(|devices| devices.into_iter().map(str::to_string).collect()),
        );
        self
    }

    pub fn add_device(&self, device: &str) {
        self.lock().devices.insert(device.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HostDevices for FakeHost {
    fn device_serials(&self) -> Vec<(String, String)> {
        self.lock().serials.clone()
    }

    fn nvme_volume_ids(&self) -> Vec<(String, String)> {
        self.lock().nvme.clone()
    }

    fn stable_links(&self) -> Result<Vec<String>, VolumeError> {
        Ok(self.lock().links.keys().cloned().collect())
    }

    fn read_stable_link(&self, name: &str) -> Result<StableLink, VolumeError> {
        Ok(self
            .lock()
            .links
            .get(name)
            .cloned()
            .unwrap_or(StableLink::Missing))
    }

    fn devices_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VolumeError> {
        Ok(self
            .lock()
            .devices
            .iter()
            .filter(|device| device.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn exists(&self, device: &str) -> bool {
        self.lock().devices.contains(device)
    }

    fn probe_signature(&self, device: &str) -> Result<FsSignature, VolumeError> {
        let state = self.lock();
        if !state.devices.contains(device) {
            return Err(VolumeError::not_found(format!("no such device {device}")));
        }
        Ok(state.signatures.get(device).cloned().unwrap_or_default())
    }

    fn inventory(&self) -> Vec<String> {
        let mut state = self.lock();
        if let Some(next) = state.inventories.pop_front() {
            state.last_inventory = Some(next);
        }
        match &state.last_inventory {
            Some(inventory) => inventory.clone(),
            None => state
                .devices
                .iter()
                .filter(|device| device.starts_with("/dev/vd"))
                .cloned()
                .collect(),
        }
    }
}
