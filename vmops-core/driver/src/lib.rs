//! vmops 驱动层
//!
//! 定义执行器依赖的单虚拟机操作接口 [`VmDriver`]，并提供两个实现：
//!
//! - **[`RestVmDriver`]**: 通过管理端点 REST API 执行克隆、删除、电源、快照操作
//! - **[`MemoryVmDriver`]**: 内存虚拟机清单，用于测试和演练
//!
//! # 示例
//!
//! ```ignore
//! use vmops_driver::{EndpointConfig, PowerState, RestVmDriver, VmDriver};
//!
//! let driver = RestVmDriver::new(EndpointConfig::default());
//! driver.set_power("vm1", &connection, PowerState::On).await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod memory;
pub mod models;
pub mod rest;

pub use client::{EndpointClient, EndpointConfig};
pub use error::{OperationError, Result};
pub use memory::MemoryVmDriver;
pub use rest::RestVmDriver;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use vmops_common::ConnectionData;

/// 电源目标状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

/// 克隆参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneSpec {
    /// 源模板名称
    pub template: String,

    /// 计算资源类型 (ESXi Host / Cluster / Resource Pool)
    pub compute_type: String,

    /// 计算资源名称
    pub compute_name: String,

    /// 描述 (可为空)
    pub description: String,
}

/// 快照参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSpec {
    /// 快照名称
    pub name: String,

    /// 描述 (可为空)
    pub description: String,
}

/// 单虚拟机操作接口
///
/// 每个方法只作用于一个虚拟机。执行器会对不同虚拟机名并发调用同一实例，
/// 实现必须可安全并发使用。
#[async_trait]
pub trait VmDriver: Send + Sync {
    /// 从模板克隆并启动新虚拟机，`vm_name` 为新虚拟机名称
    async fn clone_vm(&self, vm_name: &str, conn: &ConnectionData, spec: &CloneSpec)
        -> Result<()>;

    /// 删除虚拟机
    async fn delete_vm(&self, vm_name: &str, conn: &ConnectionData) -> Result<()>;

    /// 设置电源状态
    async fn set_power(&self, vm_name: &str, conn: &ConnectionData, state: PowerState)
        -> Result<()>;

    /// 创建快照
    async fn create_snapshot(
        &self,
        vm_name: &str,
        conn: &ConnectionData,
        spec: &SnapshotSpec,
    ) -> Result<()>;

    /// 删除快照
    async fn delete_snapshot(
        &self,
        vm_name: &str,
        conn: &ConnectionData,
        snapshot_name: &str,
    ) -> Result<()>;

    /// 恢复到快照
    async fn restore_snapshot(
        &self,
        vm_name: &str,
        conn: &ConnectionData,
        snapshot_name: &str,
    ) -> Result<()>;
}
