// SPDX-License-Identifier: GPL-3.0-only

//! Driver configuration
//!
//! Built once at startup from an optional TOML file plus environment overrides,
//! then shared read-only with every component.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use blockvol_sys::{DeviceRecordStore, SysfsHost};
use blockvol_types::PollPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_CONFIG_PATH: &str = "BLOCKVOL_CONFIG";
pub const ENV_ATTACH_DETACH_CONTROLLER: &str = "ENABLE_ATTACH_DETACH_CONTROLLER";
pub const ENV_FORCE_DETACH: &str = "DISK_FORCE_DETACHED";
pub const ENV_DISK_PARTITION: &str = "DISK_PARTITION_ENABLE";
pub const ENV_NODE_ID: &str = "NODE_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {key}: expected true or false")]
    InvalidBool { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Instance id of this node as the cloud knows it
    pub node_id: String,

    /// An external controller sequences attach/detach; this process only reports
    pub attach_detach_controller: bool,

    /// Detach a disk held by another instance before attaching it here
    pub detach_before_attach: bool,

    /// Validate and follow single-partition layouts when resolving devices
    pub disk_partition: bool,

    pub paths: HostPaths,
    pub polling: Polling,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            attach_detach_controller: false,
            detach_before_attach: false,
            disk_partition: true,
            paths: HostPaths::default(),
            polling: Polling::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPaths {
    pub dev_dir: PathBuf,
    pub sys_block_dir: PathBuf,
    pub by_id_dir: PathBuf,
    /// Directory of `<disk id>.conf` device-path records
    pub volume_dir: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
            sys_block_dir: PathBuf::from("/sys/block"),
            by_id_dir: PathBuf::from("/dev/disk/by-id"),
            volume_dir: PathBuf::from("/host/etc/kubernetes/volumes/disk"),
        }
    }
}

impl HostPaths {
    pub fn host(&self) -> SysfsHost {
        SysfsHost::new(&self.dev_dir, &self.sys_block_dir, &self.by_id_dir)
    }

    pub fn records(&self) -> DeviceRecordStore {
        DeviceRecordStore::new(&self.volume_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Polling {
    /// Waiting for a disk to become Available before attaching
    pub wait_available: PollPolicy,
    /// Waiting for an attach to reach InUse
    pub wait_in_use: PollPolicy,
    /// Waiting for a detach to settle
    pub wait_detached: PollPolicy,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            wait_available: PollPolicy::new(15, Duration::from_secs(3)),
            wait_in_use: PollPolicy::new(20, Duration::from_secs(3)),
            wait_detached: PollPolicy::new(25, Duration::from_secs(2)),
        }
    }
}

impl DriverConfig {
    /// Load from `path` (or `BLOCKVOL_CONFIG`) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_ATTACH_DETACH_CONTROLLER) {
            self.attach_detach_controller = parse_bool(ENV_ATTACH_DETACH_CONTROLLER, &value)?;
        }
        if let Some(value) = lookup(ENV_FORCE_DETACH) {
            self.detach_before_attach = parse_bool(ENV_FORCE_DETACH, &value)?;
        }
        if let Some(value) = lookup(ENV_DISK_PARTITION) {
            self.disk_partition = parse_bool(ENV_DISK_PARTITION, &value)?;
        }
        if let Some(value) = lookup(ENV_NODE_ID).filter(|v| !v.trim().is_empty()) {
            self.node_id = value.trim().to_string();
        }
        Ok(())
    }

    /// This process sequences attach/detach itself and resolves device paths
    pub fn self_managed(&self) -> bool {
        !self.attach_detach_controller
    }

    /// Same retry counts, no sleeping between polls
    pub fn without_poll_delay(mut self) -> Self {
        for policy in [
            &mut self.polling.wait_available,
            &mut self.polling.wait_in_use,
            &mut self.polling.wait_detached,
        ] {
            *policy = PollPolicy::immediate(policy.retries);
        }
        self
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}
