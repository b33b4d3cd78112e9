//! 管理端点数据模型

use serde::{Deserialize, Serialize};

use crate::error::{OperationError, Result};

/// 数据中心摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatacenterSummary {
    /// 数据中心 ID
    pub datacenter: String,

    /// 名称
    pub name: String,
}

/// 虚拟机摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSummary {
    /// 虚拟机 ID
    pub vm: String,

    /// 名称
    pub name: String,

    /// 电源状态
    #[serde(default)]
    pub power_state: Option<VmPowerState>,
}

/// 端点电源状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmPowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
}

/// 电源信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerInfo {
    pub state: VmPowerState,
}

/// 快照摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// 快照 ID
    pub snapshot: String,

    /// 名称
    pub name: String,

    /// 描述
    #[serde(default)]
    pub description: Option<String>,
}

/// 创建快照请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 是否包含内存
    pub memory: bool,
}

/// 计算资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeType {
    Host,
    Cluster,
    ResourcePool,
}

impl ComputeType {
    /// 解析计算资源类型 (大小写、空格不敏感)
    ///
    /// 接受: `ESXi Host` / `Host`, `Cluster`, `Resource Pool`
    pub fn parse(value: &str) -> Result<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "esxihost" | "host" => Ok(ComputeType::Host),
            "cluster" => Ok(ComputeType::Cluster),
            "resourcepool" => Ok(ComputeType::ResourcePool),
            _ => Err(OperationError::ConfigError(format!(
                "不支持的计算资源类型: {}",
                value
            ))),
        }
    }

    /// 查询路径片段
    pub fn api_path(&self) -> &'static str {
        match self {
            ComputeType::Host => "host",
            ComputeType::Cluster => "cluster",
            ComputeType::ResourcePool => "resource-pool",
        }
    }

    /// 查询结果中的 ID 字段名
    pub fn id_field(&self) -> &'static str {
        match self {
            ComputeType::Host => "host",
            ComputeType::Cluster => "cluster",
            ComputeType::ResourcePool => "resource_pool",
        }
    }
}

/// 克隆放置位置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Placement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
}

impl Placement {
    pub fn new(compute_type: ComputeType, compute_id: &str) -> Self {
        let id = Some(compute_id.to_string());
        match compute_type {
            ComputeType::Host => Self {
                host: id,
                ..Default::default()
            },
            ComputeType::Cluster => Self {
                cluster: id,
                ..Default::default()
            },
            ComputeType::ResourcePool => Self {
                resource_pool: id,
                ..Default::default()
            },
        }
    }
}

/// 克隆虚拟机请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneVmRequest {
    /// 新虚拟机名称
    pub name: String,

    /// 源模板 ID
    pub source: String,

    /// 放置位置
    pub placement: Placement,

    /// 克隆后启动
    pub power_on: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
