#![allow(dead_code)]

use std::sync::Arc;

use blockvol_service::{BlockVolService, DriverConfig};
use blockvol_sys::DeviceRecordStore;
use blockvol_testing::{FakeCloud, FakeHost, FakePartitionTool};
use blockvol_types::{Disk, DiskStatus};
use tempfile::TempDir;

pub const NODE: &str = "i-node1";
pub const OTHER_NODE: &str = "i-node2";
pub const WORKER: &str = "i-worker";
pub const DISK: &str = "d-bp1vol";
pub const SERIAL: &str = "bp1vol";

pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub host: Arc<FakeHost>,
    pub tool: Arc<FakePartitionTool>,
    pub records: DeviceRecordStore,
    pub service: BlockVolService,
    _records_dir: TempDir,
}

pub fn config() -> DriverConfig {
    DriverConfig {
        node_id: NODE.to_string(),
        ..DriverConfig::default()
    }
    .without_poll_delay()
}

pub fn controller_config() -> DriverConfig {
    DriverConfig {
        attach_detach_controller: true,
        ..config()
    }
}

pub fn harness(config: DriverConfig, cloud: FakeCloud, host: FakeHost) -> Harness {
    harness_with_tool(config, cloud, host, FakePartitionTool::new())
}

pub fn harness_with_tool(
    config: DriverConfig,
    cloud: FakeCloud,
    host: FakeHost,
    tool: FakePartitionTool,
) -> Harness {
    let records_dir = tempfile::tempdir().expect("create record dir");
    let records = DeviceRecordStore::new(records_dir.path());
    let cloud = Arc::new(cloud);
    let host = Arc::new(host);
    let tool = Arc::new(tool);
    let service = BlockVolService::new(
        config,
        cloud.clone(),
        host.clone(),
        tool.clone(),
        records.clone(),
    );
    Harness {
        cloud,
        host,
        tool,
        records,
        service,
        _records_dir: records_dir,
    }
}

pub fn disk(status: DiskStatus) -> Option<Disk> {
    Some(Disk::new(DISK, status))
}

pub fn disk_on(status: DiskStatus, instance: &str) -> Option<Disk> {
    Some(Disk::new(DISK, status).attached_to(instance))
}
