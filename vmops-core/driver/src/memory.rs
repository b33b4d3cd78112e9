//! 内存驱动
//!
//! 在内存中维护虚拟机清单，不访问任何端点。用于测试和 `--driver memory` 演练。
//!
//! 初始清单:
//! - 虚拟机 `vm1`、`vm2` (关机状态，各有快照 `Snapshot1`)
//! - 模板 `dummyTemplate`
//!
//! 故障注入: 名称包含 `FailsInClone` / `FailsInDelete` / `FailsInStart` /
//! `FailsInStop` 的虚拟机会在对应操作上失败。

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use vmops_common::ConnectionData;

use crate::error::{OperationError, Result};
use crate::{CloneSpec, PowerState, SnapshotSpec, VmDriver};

/// 内存虚拟机
#[derive(Debug, Clone, Default)]
pub struct MemoryVm {
    /// 是否运行
    pub powered_on: bool,

    /// 快照名称列表 (按创建顺序)
    pub snapshots: Vec<String>,

    /// 当前快照
    pub current_snapshot: Option<String>,

    /// 描述
    pub description: String,
}

impl MemoryVm {
    fn with_snapshot(name: &str) -> Self {
        Self {
            powered_on: false,
            snapshots: vec![name.to_string()],
            current_snapshot: Some(name.to_string()),
            description: String::new(),
        }
    }
}

/// 内存驱动
pub struct MemoryVmDriver {
    /// 虚拟机清单
    vms: Mutex<HashMap<String, MemoryVm>>,

    /// 模板
    templates: Mutex<HashSet<String>>,

    /// 每个虚拟机的人为延迟
    delays: Mutex<HashMap<String, Duration>>,

    /// 调用总数
    calls: AtomicUsize,

    /// 当前并发调用数
    in_flight: AtomicUsize,

    /// 观察到的最大并发调用数
    max_in_flight: AtomicUsize,
}

/// 调用期间维持并发计数，离开作用域 (包括被超时取消) 时递减
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for MemoryVmDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVmDriver {
    /// 创建带初始清单的内存驱动
    pub fn new() -> Self {
        let driver = Self::empty();
        {
            let mut vms = driver.lock_vms();
            vms.insert("vm1".to_string(), MemoryVm::with_snapshot("Snapshot1"));
            vms.insert("vm2".to_string(), MemoryVm::with_snapshot("Snapshot1"));
        }
        driver.lock_templates().insert("dummyTemplate".to_string());
        driver
    }

    /// 创建空清单
    pub fn empty() -> Self {
        Self {
            vms: Mutex::new(HashMap::new()),
            templates: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// 添加虚拟机
    pub fn with_vm(self, name: &str) -> Self {
        self.lock_vms().insert(name.to_string(), MemoryVm::default());
        self
    }

    /// 添加模板
    pub fn with_template(self, name: &str) -> Self {
        self.lock_templates().insert(name.to_string());
        self
    }

    /// 为指定虚拟机的每次调用增加延迟
    pub fn with_delay(self, vm_name: &str, delay: Duration) -> Self {
        self.lock_delays().insert(vm_name.to_string(), delay);
        self
    }

    pub fn vm_exists(&self, name: &str) -> bool {
        self.lock_vms().contains_key(name)
    }

    pub fn is_powered_on(&self, name: &str) -> bool {
        self.lock_vms().get(name).map(|vm| vm.powered_on).unwrap_or(false)
    }

    pub fn current_snapshot(&self, name: &str) -> Option<String> {
        self.lock_vms()
            .get(name)
            .and_then(|vm| vm.current_snapshot.clone())
    }

    pub fn snapshot_exists(&self, name: &str, snapshot_name: &str) -> bool {
        self.lock_vms()
            .get(name)
            .map(|vm| vm.snapshots.iter().any(|s| s == snapshot_name))
            .unwrap_or(false)
    }

    /// 虚拟机快照
    pub fn vm(&self, name: &str) -> Option<MemoryVm> {
        self.lock_vms().get(name).cloned()
    }

    /// 所有操作的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 观察到的最大并发调用数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    // 锁中毒说明其他调用在持锁期间 panic，清单仍可继续使用
    fn lock_vms(&self) -> MutexGuard<'_, HashMap<String, MemoryVm>> {
        self.vms.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_templates(&self) -> MutexGuard<'_, HashSet<String>> {
        self.templates.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_delays(&self) -> MutexGuard<'_, HashMap<String, Duration>> {
        self.delays.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 记录一次调用并施加延迟
    async fn enter(&self, op: &str, vm_name: &str) -> InFlightGuard<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlightGuard {
            counter: &self.in_flight,
        };

        debug!("内存驱动: {} {}", op, vm_name);

        let delay = self.lock_delays().get(vm_name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        guard
    }

    fn inject_failure(vm_name: &str, marker: &str, op: &str) -> Result<()> {
        if vm_name.contains(marker) {
            return Err(OperationError::OperationFailed(format!(
                "{} 虚拟机 {} 失败",
                op, vm_name
            )));
        }
        Ok(())
    }

    fn not_found(vm_name: &str) -> OperationError {
        OperationError::NotFound(format!("虚拟机 {}", vm_name))
    }
}

#[async_trait]
impl VmDriver for MemoryVmDriver {
    async fn clone_vm(&self, vm_name: &str, _conn: &ConnectionData, spec: &CloneSpec) -> Result<()> {
        let _guard = self.enter("clone", vm_name).await;
        Self::inject_failure(vm_name, "FailsInClone", "克隆")?;

        if !self.lock_templates().contains(&spec.template) {
            return Err(OperationError::NotFound(format!("模板 {}", spec.template)));
        }

        let mut vms = self.lock_vms();
        if vms.contains_key(vm_name) {
            return Err(OperationError::AlreadyExists(format!("虚拟机 {}", vm_name)));
        }

        vms.insert(
            vm_name.to_string(),
            MemoryVm {
                powered_on: true,
                description: spec.description.clone(),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn delete_vm(&self, vm_name: &str, _conn: &ConnectionData) -> Result<()> {
        let _guard = self.enter("delete", vm_name).await;
        Self::inject_failure(vm_name, "FailsInDelete", "删除")?;

        self.lock_vms()
            .remove(vm_name)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(vm_name))
    }

    async fn set_power(&self, vm_name: &str, _conn: &ConnectionData, state: PowerState) -> Result<()> {
        let _guard = self.enter("power", vm_name).await;
        match state {
            PowerState::On => Self::inject_failure(vm_name, "FailsInStart", "启动")?,
            PowerState::Off => Self::inject_failure(vm_name, "FailsInStop", "关闭")?,
        }

        let mut vms = self.lock_vms();
        let vm = vms.get_mut(vm_name).ok_or_else(|| Self::not_found(vm_name))?;
        vm.powered_on = state == PowerState::On;
        Ok(())
    }

    async fn create_snapshot(
        &self,
        vm_name: &str,
        _conn: &ConnectionData,
        spec: &SnapshotSpec,
    ) -> Result<()> {
        let _guard = self.enter("snapshot-create", vm_name).await;

        let mut vms = self.lock_vms();
        let vm = vms.get_mut(vm_name).ok_or_else(|| Self::not_found(vm_name))?;
        if !vm.snapshots.contains(&spec.name) {
            vm.snapshots.push(spec.name.clone());
        }
        vm.current_snapshot = Some(spec.name.clone());
        Ok(())
    }

    async fn delete_snapshot(
        &self,
        vm_name: &str,
        _conn: &ConnectionData,
        snapshot_name: &str,
    ) -> Result<()> {
        let _guard = self.enter("snapshot-delete", vm_name).await;

        let mut vms = self.lock_vms();
        let vm = vms.get_mut(vm_name).ok_or_else(|| Self::not_found(vm_name))?;
        let index = vm
            .snapshots
            .iter()
            .position(|s| s == snapshot_name)
            .ok_or_else(|| OperationError::NotFound(format!("快照 {}", snapshot_name)))?;

        vm.snapshots.remove(index);
        if vm.current_snapshot.as_deref() == Some(snapshot_name) {
            vm.current_snapshot = vm.snapshots.last().cloned();
        }
        Ok(())
    }

    async fn restore_snapshot(
        &self,
        vm_name: &str,
        _conn: &ConnectionData,
        snapshot_name: &str,
    ) -> Result<()> {
        let _guard = self.enter("snapshot-restore", vm_name).await;

        let mut vms = self.lock_vms();
        let vm = vms.get_mut(vm_name).ok_or_else(|| Self::not_found(vm_name))?;
        if !vm.snapshots.iter().any(|s| s == snapshot_name) {
            return Err(OperationError::NotFound(format!("快照 {}", snapshot_name)));
        }

        vm.current_snapshot = Some(snapshot_name.to_string());
        Ok(())
    }
}
