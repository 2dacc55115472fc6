// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem and partition-table signature probing

use std::process::Command;

use blockvol_types::FsSignature;
use tracing::debug;

use crate::{Result, SysError};

/// `blkid` exits with 2 when it finds no recognizable signature
const BLKID_NOTHING_FOUND: i32 = 2;

/// Probe a device for filesystem and partition-table signatures
///
/// Uses low-level probing (`blkid -p`) so the answer reflects the device
/// contents rather than the udev cache.
pub fn probe_signature(device: &str) -> Result<FsSignature> {
    which::which("blkid").map_err(|_| SysError::ToolNotFound("blkid"))?;

    let output = Command::new("blkid")
        .args(["-p", "-o", "export", device])
        .output()?;

    if output.status.code() == Some(BLKID_NOTHING_FOUND) {
        debug!(device, "no signature found");
        return Ok(FsSignature::default());
    }
    if !output.status.success() {
        return Err(SysError::CommandFailed {
            command: format!("blkid -p -o export {device}"),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let signature = parse_blkid_export(&String::from_utf8_lossy(&output.stdout));
    debug!(device, fs_type = ?signature.fs_type, pt_type = ?signature.pt_type, "probed signature");
    Ok(signature)
}

/// Parse `KEY=value` lines from `blkid -o export`
pub fn parse_blkid_export(output: &str) -> FsSignature {
    let mut signature = FsSignature::default();
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key {
            "TYPE" => signature.fs_type = Some(value.to_string()),
            "PTTYPE" => signature.pt_type = Some(value.to_string()),
            _ => {}
        }
    }
    signature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filesystem_signature() {
        let signature = parse_blkid_export(
            "DEVNAME=/dev/vdb1\nUUID=0b5c\nVERSION=1.0\nTYPE=ext4\nUSAGE=filesystem\n",
        );
        assert_eq!(signature.fs_type.as_deref(), Some("ext4"));
        assert_eq!(signature.pt_type, None);
        assert!(signature.has_filesystem());
    }

    #[test]
    fn parses_partition_table_only() {
        let signature = parse_blkid_export("DEVNAME=/dev/vdb\nPTUUID=9e1d\nPTTYPE=gpt\n");
        assert_eq!(signature.fs_type, None);
        assert_eq!(signature.pt_type.as_deref(), Some("gpt"));
        assert!(!signature.has_filesystem());
    }

    #[test]
    fn ignores_noise() {
        assert_eq!(parse_blkid_export("\ngarbage\nTYPE=\n"), FsSignature::default());
    }
}
