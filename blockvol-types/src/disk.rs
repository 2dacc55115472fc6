//! Cloud disk snapshot model
//!
//! The cloud API owns every field here. The status strings follow the cloud
//! provider's spelling (`In_use`, `ReIniting`), so serde goes through
//! [`DiskStatus::parse`] and [`DiskStatus::as_str`] rather than the derived names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix carried by every cloud disk id (e.g. `d-wz9cu3ctp6aj1iagco4h`)
pub const DISK_ID_PREFIX: &str = "d-";

/// Lifecycle status reported by the cloud for a disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiskStatus {
    Available,
    InUse,
    Attaching,
    Detaching,
    Creating,
    ReIniting,
    /// Any status string this crate does not know about
    Other(String),
}

impl DiskStatus {
    /// Parse the cloud API spelling of a status
    pub fn parse(s: &str) -> Self {
        match s {
            "Available" => Self::Available,
            "In_use" => Self::InUse,
            "Attaching" => Self::Attaching,
            "Detaching" => Self::Detaching,
            "Creating" => Self::Creating,
            "ReIniting" => Self::ReIniting,
            other => Self::Other(other.to_string()),
        }
    }

    /// Cloud API spelling of this status
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "Available",
            Self::InUse => "In_use",
            Self::Attaching => "Attaching",
            Self::Detaching => "Detaching",
            Self::Creating => "Creating",
            Self::ReIniting => "ReIniting",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for DiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DiskStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<DiskStatus> for String {
    fn from(status: DiskStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Point-in-time view of a cloud disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    /// Opaque cloud identifier
    pub id: String,

    pub status: DiskStatus,

    /// Instance the disk is attached to; the cloud reports an empty string when detached
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Provisioned size in GiB
    #[serde(default)]
    pub size_gb: u64,
}

impl Disk {
    pub fn new(id: impl Into<String>, status: DiskStatus) -> Self {
        Self {
            id: id.into(),
            status,
            instance_id: None,
            size_gb: 0,
        }
    }

    pub fn attached_to(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Instance holding the disk, treating an empty id as "not attached"
    pub fn attached_instance(&self) -> Option<&str> {
        self.instance_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_attached_to(&self, instance_id: &str) -> bool {
        self.attached_instance() == Some(instance_id)
    }
}

/// Hardware serial a disk exposes to the guest: its id without [`DISK_ID_PREFIX`]
pub fn disk_serial(disk_id: &str) -> &str {
    disk_id.strip_prefix(DISK_ID_PREFIX).unwrap_or(disk_id)
}
