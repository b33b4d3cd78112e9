//! 并行执行器集成测试
//!
//! 使用内存驱动 (初始虚拟机 vm1 / vm2，快照 Snapshot1，模板 dummyTemplate)。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use vmops_common::{keys, ConnectionData};
use vmops_driver::{
    CloneSpec, MemoryVmDriver, OperationError, PowerState, SnapshotSpec, VmDriver,
};
use vmops_executor::*;

fn cmd_args(vm_list: &str, extra: &[&str]) -> Vec<String> {
    let mut args: Vec<String> = [
        keys::VM_OPS_TOOL,
        keys::V_CENTER_URL,
        "https://localhost:8080/sdk/vimservice",
        keys::V_CENTER_USER_NAME,
        "dummyuser",
        keys::V_CENTER_PASSWORD,
        "dummypassword",
        keys::VM_LIST,
        vm_list,
        keys::TARGET_DC,
        "dummyDC",
        keys::SKIP_CA_CHECK,
        "true",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}

fn clone_args(vm_list: &str) -> Vec<String> {
    cmd_args(
        vm_list,
        &[
            keys::CLONE_TEMPLATE,
            "dummyTemplate",
            keys::COMPUTE_TYPE,
            "Cluster",
            keys::COMPUTE_NAME,
            "DummyCompute",
            keys::DESCRIPTION,
            "",
        ],
    )
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("vmops_executor=debug")
        .with_test_writer()
        .try_init();
}

fn executor(driver: &Arc<MemoryVmDriver>) -> ParallelExecutor {
    init_logging();
    ParallelExecutor::new(driver.clone())
}

fn names(result: &BatchResult) -> Vec<&str> {
    result.outcomes.iter().map(|o| o.vm_name.as_str()).collect()
}

// ---------------------------------------------------------------------------
// 克隆 / 删除
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_clone_and_delete_vms() {
    let driver = Arc::new(MemoryVmDriver::new());

    let result = executor(&driver).run(&clone_args("newVM1, newVM2")).await.unwrap();
    assert_eq!(names(&result), ["newVM1", "newVM2"]);
    assert!(driver.vm_exists("newVM1"));
    assert!(driver.vm_exists("newVM2"));
    assert!(driver.is_powered_on("newVM1"));

    let result = executor(&driver)
        .run(&cmd_args("newVM1, newVM2", &[keys::DELETE_VM, keys::DELETE_VM_ACTION]))
        .await
        .unwrap();
    assert!(result.all_passed());
    assert!(!driver.vm_exists("newVM1"));
    assert!(!driver.vm_exists("newVM2"));
}

#[tokio::test]
async fn test_clone_failure_keeps_successful_clone() {
    let driver = Arc::new(MemoryVmDriver::new());

    let err = executor(&driver)
        .run(&clone_args("newVM1, VMNameThatFailsInClone"))
        .await
        .unwrap_err();

    match err {
        BatchError::Aggregate(e) => assert_eq!(e.failed_vms(), ["VMNameThatFailsInClone"]),
        other => panic!("unexpected error: {}", other),
    }
    // 成功的克隆不回滚
    assert!(driver.vm_exists("newVM1"));
}

#[tokio::test]
async fn test_delete_failure() {
    let driver = Arc::new(MemoryVmDriver::new().with_vm("VMNameThatFailsInDelete"));

    let err = executor(&driver)
        .run(&cmd_args("vm1, VMNameThatFailsInDelete", &[keys::DELETE_VM, keys::DELETE_VM_ACTION]))
        .await
        .unwrap_err();

    let BatchError::Aggregate(e) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(e.failed_vms(), ["VMNameThatFailsInDelete"]);
    assert!(!driver.vm_exists("vm1"));
    assert!(driver.vm_exists("VMNameThatFailsInDelete"));
}

// ---------------------------------------------------------------------------
// 电源操作
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_power_start_all_succeed() {
    let driver = Arc::new(MemoryVmDriver::new());

    let result = executor(&driver)
        .run(&cmd_args("vm1, vm2", &[keys::POWER_OPS, keys::START_VM_ACTION]))
        .await
        .unwrap();

    assert!(!result.overall_failed);
    assert_eq!(result.successful, 2);
    assert!(driver.is_powered_on("vm1"));
    assert!(driver.is_powered_on("vm2"));
}

#[tokio::test]
async fn test_power_start_one_failure() {
    let driver = Arc::new(MemoryVmDriver::new());

    let err = executor(&driver)
        .run(&cmd_args("vm1, VmThatFailsInStart", &[keys::POWER_OPS, keys::START_VM_ACTION]))
        .await
        .unwrap_err();

    let BatchError::Aggregate(e) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(e.total, 2);
    assert_eq!(e.failed_vms(), ["VmThatFailsInStart"]);
    assert!(e.to_string().contains("VmThatFailsInStart"));
    assert!(!e.to_string().contains("vm1"));
    assert!(driver.is_powered_on("vm1"));
}

#[tokio::test]
async fn test_power_stop_one_failure() {
    let driver = Arc::new(MemoryVmDriver::new());
    executor(&driver)
        .run(&cmd_args("vm1", &[keys::POWER_OPS, keys::START_VM_ACTION]))
        .await
        .unwrap();

    let err = executor(&driver)
        .run(&cmd_args("vm1, VmThatFailsInStop", &[keys::POWER_OPS, keys::STOP_VM_ACTION]))
        .await
        .unwrap_err();

    let BatchError::Aggregate(e) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(e.failed_vms(), ["VmThatFailsInStop"]);
    assert!(!driver.is_powered_on("vm1"));
}

#[tokio::test]
async fn test_duplicate_names_processed_independently() {
    let driver = Arc::new(MemoryVmDriver::new());

    let result = executor(&driver)
        .run(&cmd_args("vm1, vm1", &[keys::POWER_OPS, keys::START_VM_ACTION]))
        .await
        .unwrap();

    assert_eq!(names(&result), ["vm1", "vm1"]);
    assert_eq!(driver.call_count(), 2);
}

// ---------------------------------------------------------------------------
// 快照操作
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_snapshot_create_on_unknown_vm() {
    let driver = Arc::new(MemoryVmDriver::new());

    let err = executor(&driver)
        .run(&cmd_args(
            "vm1, vm3",
            &[
                keys::SNAPSHOT_OPS,
                keys::CREATE_SNAPSHOT_ACTION,
                keys::SNAPSHOT_NAME,
                "Snapshot2",
                keys::DESCRIPTION,
                "",
            ],
        ))
        .await
        .unwrap_err();

    let BatchError::Aggregate(e) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(e.failed_vms(), ["vm3"]);
    assert!(matches!(e.failures[0].cause, OperationError::NotFound(_)));
    assert!(driver.snapshot_exists("vm1", "Snapshot2"));
    assert_eq!(driver.current_snapshot("vm1").as_deref(), Some("Snapshot2"));
}

#[tokio::test]
async fn test_snapshot_create_on_all_vms() {
    let driver = Arc::new(MemoryVmDriver::new());

    let result = executor(&driver)
        .run(&cmd_args(
            "vm1, vm2",
            &[
                keys::SNAPSHOT_OPS,
                keys::CREATE_SNAPSHOT_ACTION,
                keys::SNAPSHOT_NAME,
                "Snapshot2",
                keys::DESCRIPTION,
                "before upgrade",
            ],
        ))
        .await
        .unwrap();

    assert!(result.all_passed());
    assert_eq!(names(&result), ["vm1", "vm2"]);
    for vm in ["vm1", "vm2"] {
        assert!(driver.snapshot_exists(vm, "Snapshot1"));
        assert!(driver.snapshot_exists(vm, "Snapshot2"));
        assert_eq!(driver.current_snapshot(vm).as_deref(), Some("Snapshot2"));
    }
}

#[tokio::test]
async fn test_snapshot_delete_on_unknown_vm() {
    let driver = Arc::new(MemoryVmDriver::new());

    let err = executor(&driver)
        .run(&cmd_args(
            "vm1, vm3",
            &[keys::SNAPSHOT_OPS, keys::DELETE_SNAPSHOT_ACTION, keys::SNAPSHOT_NAME, "Snapshot1"],
        ))
        .await
        .unwrap_err();

    let BatchError::Aggregate(e) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(e.failed_vms(), ["vm3"]);
    assert!(matches!(e.failures[0].cause, OperationError::NotFound(_)));
    assert!(e.to_string().contains("vm3"));
    assert!(!driver.snapshot_exists("vm1", "Snapshot1"));
    assert!(driver.snapshot_exists("vm2", "Snapshot1"));
}

#[tokio::test]
async fn test_snapshot_restore_and_delete() {
    let driver = Arc::new(MemoryVmDriver::new());
    let snapshot = |op: &'static str| {
        cmd_args("vm1, vm2", &[keys::SNAPSHOT_OPS, op, keys::SNAPSHOT_NAME, "Snapshot1"])
    };

    let result = executor(&driver)
        .run(&snapshot(keys::RESTORE_SNAPSHOT_ACTION))
        .await
        .unwrap();
    assert_eq!(result.successful, 2);
    assert_eq!(driver.current_snapshot("vm2").as_deref(), Some("Snapshot1"));

    executor(&driver)
        .run(&snapshot(keys::DELETE_SNAPSHOT_ACTION))
        .await
        .unwrap();
    assert!(!driver.snapshot_exists("vm1", "Snapshot1"));
    assert!(!driver.snapshot_exists("vm2", "Snapshot1"));
}

#[tokio::test]
async fn test_snapshot_restore_on_unknown_vm() {
    let driver = Arc::new(MemoryVmDriver::new());

    let result = executor(&driver)
        .execute_batch(
            &ActionDescriptor::from_args(&cmd_args(
                "vm1, vm3",
                &[keys::SNAPSHOT_OPS, keys::RESTORE_SNAPSHOT_ACTION, keys::SNAPSHOT_NAME, "Snapshot1"],
            ))
            .unwrap(),
        )
        .await
        .unwrap();

    assert!(result.overall_failed);
    assert!(result.outcomes[0].success);
    assert!(!result.outcomes[1].success);
    assert!(result.outcomes[1].error.is_some());
}

// ---------------------------------------------------------------------------
// 校验 (不触发任何驱动调用)
// ---------------------------------------------------------------------------

async fn assert_rejected(args: Vec<String>) -> ValidationError {
    let driver = Arc::new(MemoryVmDriver::new());
    let err = executor(&driver).run(&args).await.unwrap_err();
    assert_eq!(driver.call_count(), 0);
    match err {
        BatchError::Validation(e) => e,
        other => panic!("expected validation error, got {}", other),
    }
}

#[tokio::test]
async fn test_invalid_action_rejected() {
    let err = assert_rejected(cmd_args("vm1, vm2", &["-invalidOps", "start"])).await;
    assert_eq!(err, ValidationError::NoAction);
}

#[tokio::test]
async fn test_invalid_power_sub_action_rejected() {
    let err = assert_rejected(cmd_args("vm1, vm2", &[keys::POWER_OPS, "pause"])).await;
    assert!(matches!(err, ValidationError::UnsupportedSubAction { .. }));
}

#[tokio::test]
async fn test_invalid_snapshot_sub_action_rejected() {
    let err = assert_rejected(cmd_args(
        "vm1",
        &[keys::SNAPSHOT_OPS, "rename", keys::SNAPSHOT_NAME, "Snapshot1"],
    ))
    .await;
    assert!(matches!(err, ValidationError::UnsupportedSubAction { .. }));
}

#[tokio::test]
async fn test_empty_vm_list_rejected() {
    let err = assert_rejected(cmd_args(" , ", &[keys::POWER_OPS, keys::START_VM_ACTION])).await;
    assert_eq!(err, ValidationError::EmptyVmList);
}

#[tokio::test]
async fn test_missing_connection_field_rejected() {
    let args: Vec<String> = cmd_args("vm1", &[keys::POWER_OPS, keys::START_VM_ACTION])
        .into_iter()
        .filter(|a| a != keys::TARGET_DC && a != "dummyDC")
        .collect();
    let err = assert_rejected(args).await;
    assert_eq!(err, ValidationError::MissingArgument(keys::TARGET_DC.to_string()));
}

#[tokio::test]
async fn test_unknown_compute_type_rejected() {
    let args: Vec<String> = clone_args("newVM1")
        .into_iter()
        .map(|a| if a == "Cluster" { "Mainframe".to_string() } else { a })
        .collect();
    let err = assert_rejected(args).await;
    assert_eq!(
        err,
        ValidationError::InvalidValue {
            key: keys::COMPUTE_TYPE.to_string(),
            value: "Mainframe".to_string(),
        }
    );
}

#[tokio::test]
async fn test_only_tool_marker_rejected() {
    assert_rejected(vec![keys::VM_OPS_TOOL.to_string()]).await;
}

#[test]
fn test_parse_twice_yields_equal_descriptors() {
    let args = clone_args("newVM1, newVM2");
    let first = ActionDescriptor::from_args(&args).unwrap();
    let second = ActionDescriptor::from_args(&args).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.parameters().get(keys::DESCRIPTION), "");
}

// ---------------------------------------------------------------------------
// 并发语义
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_outcomes_follow_submission_order() {
    let driver = Arc::new(
        MemoryVmDriver::new()
            .with_vm("vm4")
            .with_delay("vm1", Duration::from_millis(300))
            .with_delay("vm2", Duration::from_millis(200))
            .with_delay("vm4", Duration::from_millis(100)),
    );

    let result = executor(&driver)
        .run(&cmd_args("vm1, vm2, vm4", &[keys::POWER_OPS, keys::START_VM_ACTION]))
        .await
        .unwrap();

    assert_eq!(names(&result), ["vm1", "vm2", "vm4"]);
    assert!(result.outcomes.iter().all(|o| o.success));
}

#[tokio::test(start_paused = true)]
async fn test_worker_bound_respected() {
    let mut driver = MemoryVmDriver::new();
    let vms = ["a1", "a2", "a3", "a4", "a5", "a6"];
    for vm in vms {
        driver = driver.with_vm(vm).with_delay(vm, Duration::from_millis(50));
    }
    let driver = Arc::new(driver);

    let result = executor(&driver)
        .with_max_workers(2)
        .run(&cmd_args(&vms.join(","), &[keys::POWER_OPS, keys::START_VM_ACTION]))
        .await
        .unwrap();

    assert_eq!(result.total, 6);
    assert_eq!(driver.call_count(), 6);
    assert_eq!(driver.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unit_timeout_only_fails_slow_vm() {
    let driver = Arc::new(MemoryVmDriver::new().with_delay("vm1", Duration::from_secs(5)));

    let result = executor(&driver)
        .with_unit_timeout(Duration::from_secs(1))
        .execute_batch(
            &ActionDescriptor::from_args(&cmd_args("vm1, vm2", &[keys::POWER_OPS, keys::START_VM_ACTION]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(matches!(result.outcomes[0].error, Some(OperationError::Timeout(_))));
    assert!(result.outcomes[1].success);
    assert!(!driver.is_powered_on("vm1"));
    assert!(driver.is_powered_on("vm2"));
}

/// 对指定虚拟机 panic 的驱动
struct PanickingDriver;

#[async_trait]
impl VmDriver for PanickingDriver {
    async fn clone_vm(&self, _: &str, _: &ConnectionData, _: &CloneSpec) -> vmops_driver::Result<()> {
        Ok(())
    }

    async fn delete_vm(&self, _: &str, _: &ConnectionData) -> vmops_driver::Result<()> {
        Ok(())
    }

    async fn set_power(&self, vm_name: &str, _: &ConnectionData, _: PowerState) -> vmops_driver::Result<()> {
        if vm_name == "boom" {
            panic!("driver panic");
        }
        Ok(())
    }

    async fn create_snapshot(&self, _: &str, _: &ConnectionData, _: &SnapshotSpec) -> vmops_driver::Result<()> {
        Ok(())
    }

    async fn delete_snapshot(&self, _: &str, _: &ConnectionData, _: &str) -> vmops_driver::Result<()> {
        Ok(())
    }

    async fn restore_snapshot(&self, _: &str, _: &ConnectionData, _: &str) -> vmops_driver::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_panicking_unit_becomes_failed_outcome() {
    let executor = ParallelExecutor::new(Arc::new(PanickingDriver));

    let err = executor
        .run(&cmd_args("vm1, boom, vm2", &[keys::POWER_OPS, keys::START_VM_ACTION]))
        .await
        .unwrap_err();

    let BatchError::Aggregate(e) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(e.failed_vms(), ["boom"]);
    assert!(matches!(e.failures[0].cause, OperationError::Aborted(_)));
    assert_eq!(e.result.successful, 2);
}
