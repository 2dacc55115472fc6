mod common;

use blockvol_contracts::VolumeErrorKind;
use blockvol_testing::{CloudCall, FakeCloud, FakeHost};
use blockvol_types::{DiskStatus, PollPolicy};
use common::{DISK, NODE, OTHER_NODE, SERIAL, WORKER, config, controller_config, disk, disk_on, harness};

#[tokio::test]
async fn available_disk_attaches_on_third_poll() {
    let cloud = FakeCloud::scripted([
        disk(DiskStatus::Available),
        disk(DiskStatus::Attaching),
        disk(DiskStatus::Attaching),
        disk_on(DiskStatus::InUse, NODE),
    ]);
    let host = FakeHost::new().with_serial("/dev/vdb", SERIAL);
    let h = harness(config(), cloud, host);

    let device = h.service.attach(DISK, NODE).await.unwrap();

    assert_eq!(device.as_deref(), Some("/dev/vdb"));
    assert_eq!(h.cloud.describe_count(), 4);
    assert_eq!(
        h.cloud.calls()[1],
        CloudCall::Attach {
            disk_id: DISK.to_string(),
            instance_id: NODE.to_string()
        }
    );
    assert_eq!(h.records.lookup(DISK).as_deref(), Some("/dev/vdb"));
    assert!(!h.service.attach_mutex().is_held());
    assert!(!h.service.in_flight().contains(DISK));
}

#[tokio::test]
async fn attach_under_controller_is_idempotent_with_one_describe() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::InUse, NODE).unwrap());
    let h = harness(controller_config(), cloud, FakeHost::new());

    assert_eq!(h.service.attach(DISK, NODE).await.unwrap(), None);
    assert_eq!(h.cloud.calls(), vec![CloudCall::Describe(DISK.to_string())]);
}

#[tokio::test]
async fn attach_under_controller_returns_no_device() {
    let cloud = FakeCloud::scripted([
        disk(DiskStatus::Available),
        disk_on(DiskStatus::InUse, NODE),
    ]);
    let host = FakeHost::new().with_inventories([vec!["/dev/vda"], vec!["/dev/vda", "/dev/vdb"]]);
    let h = harness(controller_config(), cloud, host);

    assert_eq!(h.service.attach(DISK, NODE).await.unwrap(), None);
    assert_eq!(h.cloud.attach_count(), 1);
    assert_eq!(h.records.lookup(DISK), None);
}

#[tokio::test]
async fn controller_attaches_to_the_requested_node() {
    let cloud = FakeCloud::scripted([
        disk(DiskStatus::Available),
        disk_on(DiskStatus::InUse, WORKER),
    ]);
    let mut config = controller_config();
    config.node_id = String::new();
    let h = harness(config, cloud, FakeHost::new());

    assert_eq!(h.service.attach(DISK, WORKER).await.unwrap(), None);
    assert_eq!(
        h.cloud.calls()[1],
        CloudCall::Attach {
            disk_id: DISK.to_string(),
            instance_id: WORKER.to_string()
        }
    );
}

#[tokio::test]
async fn controller_sees_disk_on_requested_node_as_attached() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::InUse, WORKER).unwrap());
    let h = harness(controller_config(), cloud, FakeHost::new());

    assert_eq!(h.service.attach(DISK, WORKER).await.unwrap(), None);
    assert_eq!(h.cloud.calls(), vec![CloudCall::Describe(DISK.to_string())]);
}

#[tokio::test]
async fn already_attached_here_reuses_resolved_device() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::InUse, NODE).unwrap());
    let host = FakeHost::new().with_serial("/dev/vdc", SERIAL);
    let h = harness(config(), cloud, host);

    assert_eq!(h.service.attach(DISK, NODE).await.unwrap().as_deref(), Some("/dev/vdc"));
    assert_eq!(h.cloud.attach_count(), 0);
}

#[tokio::test]
async fn already_attached_here_falls_back_to_device_record() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::InUse, NODE).unwrap());
    let host = FakeHost::new().with_device("/dev/vdd");
    let h = harness(config(), cloud, host);
    h.records.record(DISK, "/dev/vdd").unwrap();

    assert_eq!(h.service.attach(DISK, NODE).await.unwrap().as_deref(), Some("/dev/vdd"));
}

#[tokio::test]
async fn already_attached_device_claimed_by_other_disk_is_not_found() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::InUse, NODE).unwrap());
    let host = FakeHost::new().with_serial("/dev/vdb", SERIAL);
    let h = harness(config(), cloud, host);
    h.records.record("d-someoneelse", "/dev/vdb").unwrap();

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::NotFound);
    assert_eq!(h.cloud.attach_count(), 0);
}

#[tokio::test]
async fn already_attached_without_device_is_not_found() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::InUse, NODE).unwrap());
    let h = harness(config(), cloud, FakeHost::new());
    h.records.record(DISK, "/dev/vdq").unwrap();

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::NotFound);
}

#[tokio::test]
async fn attached_elsewhere_is_permanent_without_force_detach() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::InUse, OTHER_NODE).unwrap());
    let h = harness(config(), cloud, FakeHost::new());

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::AttachedElsewhere);
    assert!(!err.is_retryable());
    assert_eq!(h.cloud.detach_count(), 0);
    assert_eq!(h.cloud.attach_count(), 0);
}

#[tokio::test]
async fn force_detach_releases_other_holder_first() {
    let cloud = FakeCloud::scripted([
        disk_on(DiskStatus::InUse, OTHER_NODE),
        disk_on(DiskStatus::Detaching, OTHER_NODE),
        disk(DiskStatus::Available),
        disk_on(DiskStatus::InUse, NODE),
    ]);
    let host = FakeHost::new().with_serial("/dev/vdb", SERIAL);
    let mut config = config();
    config.detach_before_attach = true;
    let h = harness(config, cloud, host);

    assert_eq!(h.service.attach(DISK, NODE).await.unwrap().as_deref(), Some("/dev/vdb"));
    assert_eq!(
        h.cloud.calls(),
        vec![
            CloudCall::Describe(DISK.to_string()),
            CloudCall::Detach {
                disk_id: DISK.to_string(),
                instance_id: OTHER_NODE.to_string()
            },
            CloudCall::Describe(DISK.to_string()),
            CloudCall::Describe(DISK.to_string()),
            CloudCall::Attach {
                disk_id: DISK.to_string(),
                instance_id: NODE.to_string()
            },
            CloudCall::Describe(DISK.to_string()),
        ]
    );
}

#[tokio::test]
async fn attaching_disk_is_busy() {
    let cloud = FakeCloud::with_disk(disk_on(DiskStatus::Attaching, OTHER_NODE).unwrap());
    let h = harness(config(), cloud, FakeHost::new());

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::Busy);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unavailable_disk_times_out_after_budget() {
    let cloud = FakeCloud::with_disk(disk(DiskStatus::Detaching).unwrap());
    let mut config = config();
    config.polling.wait_available = PollPolicy::immediate(3);
    let h = harness(config, cloud, FakeHost::new());

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::Timeout);
    assert_eq!(h.cloud.describe_count(), 4);
    assert_eq!(h.cloud.attach_count(), 0);
}

#[tokio::test]
async fn attach_that_never_reaches_in_use_times_out() {
    let cloud = FakeCloud::scripted([disk(DiskStatus::Available), disk(DiskStatus::Attaching)]);
    let h = harness(config(), cloud, FakeHost::new());

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::Timeout);
    assert_eq!(h.cloud.describe_count(), 21);
}

#[tokio::test]
async fn missing_disk_cannot_be_attached() {
    let h = harness(config(), FakeCloud::scripted([None]), FakeHost::new());

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::NotFound);
}

#[tokio::test]
async fn disk_vanishing_while_attaching_is_not_found() {
    let cloud = FakeCloud::scripted([disk(DiskStatus::Available), disk(DiskStatus::Attaching), None]);
    let h = harness(config(), cloud, FakeHost::new());

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::NotFound);
    assert_eq!(h.cloud.describe_count(), 3);
}

#[tokio::test]
async fn held_attach_mutex_aborts_without_cloud_mutation() {
    let cloud = FakeCloud::with_disk(disk(DiskStatus::Available).unwrap());
    let h = harness(config(), cloud, FakeHost::new());
    let _permit = h.service.attach_mutex().try_acquire().unwrap();

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::Aborted);
    assert!(err.is_retryable());
    assert_eq!(h.cloud.calls(), vec![CloudCall::Describe(DISK.to_string())]);
}

#[tokio::test]
async fn controller_mode_ignores_attach_mutex() {
    let cloud = FakeCloud::scripted([
        disk(DiskStatus::Available),
        disk_on(DiskStatus::InUse, NODE),
    ]);
    let h = harness(controller_config(), cloud, FakeHost::new());
    let _permit = h.service.attach_mutex().try_acquire().unwrap();

    assert_eq!(h.service.attach(DISK, NODE).await.unwrap(), None);
}

#[tokio::test]
async fn cloud_attach_failure_propagates() {
    let cloud = FakeCloud::with_disk(disk(DiskStatus::Available).unwrap());
    cloud.fail_attach(blockvol_contracts::VolumeError::new(
        VolumeErrorKind::Unavailable,
        "quota exceeded",
    ));
    let h = harness(config(), cloud, FakeHost::new());

    let err = h.service.attach(DISK, NODE).await.unwrap_err();
    assert_eq!(err.kind, VolumeErrorKind::Unavailable);
    assert_eq!(h.cloud.describe_count(), 1);
}

mod inventory_diff {
    use super::*;

    fn attaching_cloud() -> FakeCloud {
        FakeCloud::scripted([
            disk(DiskStatus::Available),
            disk_on(DiskStatus::InUse, NODE),
        ])
    }

    // Known gap: a single new device is accepted without checking that it
    // belongs to the disk, so an unrelated hot-plug racing the attach wins.
    #[tokio::test]
    async fn known_gap_single_new_device_is_trusted_unverified() {
        let host = FakeHost::new()
            .with_inventories([vec!["/dev/vda"], vec!["/dev/vda", "/dev/vdc"]]);
        let h = harness(config(), attaching_cloud(), host);

        assert_eq!(h.service.attach(DISK, NODE).await.unwrap().as_deref(), Some("/dev/vdc"));
        assert_eq!(h.records.lookup(DISK).as_deref(), Some("/dev/vdc"));
    }

    #[tokio::test]
    async fn root_and_partition_yield_the_partition() {
        let host = FakeHost::new()
            .with_partition_table("/dev/vdb", "dos")
            .with_filesystem("/dev/vdb1", "ext4")
            .with_inventories([
                vec!["/dev/vda"],
                vec!["/dev/vda", "/dev/vdb", "/dev/vdb1"],
            ]);
        let h = harness(config(), attaching_cloud(), host);

        assert_eq!(h.service.attach(DISK, NODE).await.unwrap().as_deref(), Some("/dev/vdb1"));
    }

    #[tokio::test]
    async fn root_and_partition_with_bad_signatures_is_invalid() {
        let host = FakeHost::new()
            .with_filesystem("/dev/vdb", "ext4")
            .with_filesystem("/dev/vdb1", "ext4")
            .with_inventories([
                vec!["/dev/vda"],
                vec!["/dev/vda", "/dev/vdb", "/dev/vdb1"],
            ]);
        let h = harness(config(), attaching_cloud(), host);

        let err = h.service.attach(DISK, NODE).await.unwrap_err();
        assert_eq!(err.kind, VolumeErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn unrelated_pair_is_indeterminate() {
        let host = FakeHost::new().with_inventories([
            vec!["/dev/vda"],
            vec!["/dev/vda", "/dev/vdb1", "/dev/vdc"],
        ]);
        let h = harness(config(), attaching_cloud(), host);

        let err = h.service.attach(DISK, NODE).await.unwrap_err();
        assert_eq!(err.kind, VolumeErrorKind::Indeterminate);
        assert!(err.is_retryable());
        assert!(err.message.contains("will retry later"));
    }

    #[tokio::test]
    async fn device_record_is_consulted_before_diffing() {
        let host = FakeHost::new()
            .with_device("/dev/vdd")
            .with_inventories([vec!["/dev/vda", "/dev/vdd"], vec!["/dev/vda", "/dev/vdd"]]);
        let h = harness(config(), attaching_cloud(), host);
        h.records.record(DISK, "/dev/vdd").unwrap();

        assert_eq!(h.service.attach(DISK, NODE).await.unwrap().as_deref(), Some("/dev/vdd"));
    }

    #[tokio::test]
    async fn record_claimed_by_other_disk_falls_through_to_diff() {
        let host = FakeHost::new()
            .with_device("/dev/vdd")
            .with_inventories([vec!["/dev/vdd"], vec!["/dev/vdd"]]);
        let h = harness(config(), attaching_cloud(), host);
        h.records.record(DISK, "/dev/vdd").unwrap();
        h.records.record("d-someoneelse", "/dev/vdd").unwrap();

        let err = h.service.attach(DISK, NODE).await.unwrap_err();
        assert_eq!(err.kind, VolumeErrorKind::Indeterminate);
    }

    #[tokio::test]
    async fn no_new_device_is_indeterminate() {
        let host = FakeHost::new().with_inventories([vec!["/dev/vda"]]);
        let h = harness(config(), attaching_cloud(), host);

        let err = h.service.attach(DISK, NODE).await.unwrap_err();
        assert_eq!(err.kind, VolumeErrorKind::Indeterminate);
    }
}
