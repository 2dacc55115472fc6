// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use blockvol_contracts::{PartitionTool, VolumeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Dump(String),
    Grow { disk: String, partition: u32 },
    GrowFinished { disk: String, partition: u32 },
    Refresh { disk: String, partition: u32 },
}

struct ToolState {
    dump: Result<String, VolumeError>,
    grow: Result<String, VolumeError>,
    refresh: Result<String, VolumeError>,
    hang_dump: bool,
    grow_delay: Duration,
    calls: Vec<ToolCall>,
}

/// Partition tool with canned answers for each step
pub struct FakePartitionTool {
    state: Mutex<ToolState>,
}

impl Default for FakePartitionTool {
    fn default() -> Self {
        Self {
            state: Mutex::new(ToolState {
                dump: Ok("label: dos\n/dev/vdb1 : start=2048, size=2095104, type=83\n".to_string()),
                grow: Ok(String::new()),
                refresh: Ok(String::new()),
                hang_dump: false,
                grow_delay: Duration::ZERO,
                calls: Vec::new(),
            }),
        }
    }
}

impl FakePartitionTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dump(self, dump: Result<String, VolumeError>) -> Self {
        self.lock().dump = dump;
        self
    }

    pub fn with_grow(self, grow: Result<String, VolumeError>) -> Self {
        self.lock().grow = grow;
        self
    }

    pub fn with_refresh(self, refresh: Result<String, VolumeError>) -> Self {
        self.lock().refresh = refresh;
        self
    }

    /// `dump` never completes
    pub fn hanging_dump(self) -> Self {
        self.lock().hang_dump = true;
        self
    }

    pub fn with_grow_delay(self, delay: Duration) -> Self {
        self.lock().grow_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ToolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PartitionTool for FakePartitionTool {
    async fn dump(&self, disk: &str) -> Result<String, VolumeError> {
        let (hang, result) = {
            let mut state = self.lock();
            state.calls.push(ToolCall::Dump(disk.to_string()));
            (state.hang_dump, state.dump.clone())
        };
        if hang {
            std::future::pending::<()>().await;
        }
        result
    }

    async fn grow_partition(&self, disk: &str, partition: u32) -> Result<String, VolumeError> {
        let (delay, result) = {
            let mut state = self.lock();
            state.calls.push(ToolCall::Grow {
                disk: disk.to_string(),
                partition,
            });
            (state.grow_delay, state.grow.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.lock().calls.push(ToolCall::GrowFinished {
            disk: disk.to_string(),
            partition,
        });
        result
    }

    async fn refresh_partition(&self, disk: &str, partition: u32) -> Result<String, VolumeError> {
        let mut state = self.lock();
        state.calls.push(ToolCall::Refresh {
            disk: disk.to_string(),
            partition,
        });
        state.refresh.clone()
    }
}
