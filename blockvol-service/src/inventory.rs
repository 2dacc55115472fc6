// SPDX-License-Identifier: GPL-3.0-only

//! Before/after inventory diff used when no strategy can name the new device

use std::collections::BTreeSet;

use blockvol_contracts::{VolumeError, VolumeErrorKind};
use blockvol_types::is_partition_of;
use tracing::{info, warn};

use crate::partition::PartitionAdapter;

/// Devices present in `after` but not in `before`, sorted
pub fn new_devices(before: &[String], after: &[String]) -> Vec<String> {
    let before: BTreeSet<&str> = before.iter().map(String::as_str).collect();
    after
        .iter()
        .filter(|device| !before.contains(device.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Pick the device an attach produced from the newly appeared ones
///
/// One new device is taken as is. Two are accepted only as a root device and
/// its partition, which must pass the filesystem cross-check.
pub fn select_new_device(
    disk_id: &str,
    new: &[String],
    adapter: &PartitionAdapter,
) -> Result<String, VolumeError> {
    match new {
        // not verified against the disk: a concurrent hot-plug would be taken for it
        [device] => {
            info!(disk_id, device = %device, "new device found by inventory diff");
            Ok(device.clone())
        }
        [first, second] => {
            let (root, sub) = if first.len() <= second.len() {
                (first, second)
            } else {
                (second, first)
            };
            if !is_partition_of(root, sub) {
                return Err(indeterminate(disk_id, new));
            }
            adapter.check_root_and_sub_device_fs(root, sub)?;
            info!(disk_id, device = %sub, "new partitioned device found by inventory diff");
            Ok(sub.clone())
        }
        _ => Err(indeterminate(disk_id, new)),
    }
}

fn indeterminate(disk_id: &str, new: &[String]) -> VolumeError {
    warn!(disk_id, ?new, "cannot tell which new device belongs to the disk");
    VolumeError::new(
        VolumeErrorKind::Indeterminate,
        format!(
            "{} new devices {:?} after attaching {disk_id}, will retry later",
            new.len(),
            new
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use blockvol_testing::FakeHost;

    fn devices(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn adapter(host: FakeHost) -> PartitionAdapter {
        PartitionAdapter::new(true, Arc::new(host))
    }

    #[test]
    fn diff_keeps_only_new_devices() {
        let before = devices(&["/dev/vda", "/dev/vda1"]);
        let after = devices(&["/dev/vdb", "/dev/vda", "/dev/vda1", "/dev/vdb1"]);
        assert_eq!(new_devices(&before, &after), devices(&["/dev/vdb", "/dev/vdb1"]));
        assert!(new_devices(&after, &before).is_empty());
    }

    #[test]
    fn single_new_device_is_taken() {
        let device = select_new_device("d-a", &devices(&["/dev/vdc"]), &adapter(FakeHost::new()))
            .unwrap();
        assert_eq!(device, "/dev/vdc");
    }

    #[test]
    fn root_and_partition_pair_yields_partition() {
        let host = FakeHost::new()
            .with_partition_table("/dev/vdb", "gpt")
            .with_filesystem("/dev/vdb1", "xfs");
        let device =
            select_new_device("d-a", &devices(&["/dev/vdb1", "/dev/vdb"]), &adapter(host)).unwrap();
        assert_eq!(device, "/dev/vdb1");
    }

    #[test]
    fn unrelated_pair_is_indeterminate() {
        let err = select_new_device(
            "d-a",
            &devices(&["/dev/vdb1", "/dev/vdc"]),
            &adapter(FakeHost::new()),
        )
        .unwrap_err();
        assert_eq!(err.kind, VolumeErrorKind::Indeterminate);
        assert!(err.is_retryable());
    }

    #[test]
    fn zero_or_many_new_devices_are_indeterminate() {
        let adapter = adapter(FakeHost::new());
        for new in [devices(&[]), devices(&["/dev/vdb", "/dev/vdc", "/dev/vdd"])] {
            let err = select_new_device("d-a", &new, &adapter).unwrap_err();
            assert_eq!(err.kind, VolumeErrorKind::Indeterminate);
        }
    }
}
