//! 结果汇总
//!
//! 把各执行单元的结果归并为一个 [`BatchResult`]。

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

use vmops_driver::OperationError;

/// 单个虚拟机的执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerVmOutcome {
    /// 虚拟机名称
    pub vm_name: String,

    /// 是否成功
    pub success: bool,

    /// 失败原因 (仅失败时存在)
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,

    /// 执行耗时（毫秒）
    pub duration_ms: u64,
}

impl PerVmOutcome {
    pub fn from_result(vm_name: &str, result: Result<(), OperationError>, duration_ms: u64) -> Self {
        match result {
            Ok(()) => Self::succeeded(vm_name, duration_ms),
            Err(e) => Self::failed(vm_name, e, duration_ms),
        }
    }

    pub fn succeeded(vm_name: &str, duration_ms: u64) -> Self {
        Self {
            vm_name: vm_name.to_string(),
            success: true,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(vm_name: &str, error: OperationError, duration_ms: u64) -> Self {
        Self {
            vm_name: vm_name.to_string(),
            success: false,
            error: Some(error),
            duration_ms,
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<OperationError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// 批次元数据
#[derive(Debug, Clone)]
pub struct BatchMeta {
    /// 操作标签
    pub action: String,

    /// 开始时间
    pub started_at: DateTime<Utc>,

    /// 总耗时（毫秒）
    pub duration_ms: u64,
}

/// 批量执行结果
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// 操作标签
    pub action: String,

    /// 开始时间
    pub started_at: DateTime<Utc>,

    /// 总耗时（毫秒）
    pub duration_ms: u64,

    /// 总数
    pub total: usize,

    /// 成功数
    pub successful: usize,

    /// 失败数
    pub failed: usize,

    /// 是否存在失败
    pub overall_failed: bool,

    /// 各虚拟机结果 (按提交顺序)
    pub outcomes: Vec<PerVmOutcome>,
}

impl BatchResult {
    /// 是否全部成功
    pub fn all_passed(&self) -> bool {
        !self.overall_failed
    }

    /// 按顺序遍历失败结果
    pub fn failures(&self) -> impl Iterator<Item = &PerVmOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// 存在失败时转换为汇总错误
    pub fn into_result(self) -> Result<Self, AggregateBatchError> {
        if !self.overall_failed {
            return Ok(self);
        }

        let failures: Vec<VmFailure> = self
            .failures()
            .map(|o| VmFailure {
                vm_name: o.vm_name.clone(),
                cause: o
                    .error
                    .clone()
                    .unwrap_or_else(|| OperationError::OperationFailed("未知原因".to_string())),
            })
            .collect();

        Err(AggregateBatchError {
            action: self.action.clone(),
            total: self.total,
            failures,
            result: Box::new(self),
        })
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }
}

/// 单个虚拟机的失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmFailure {
    pub vm_name: String,
    pub cause: OperationError,
}

/// 批次汇总错误：至少一个虚拟机失败
///
/// 所有执行单元结束后才会产生。成功的虚拟机不会回滚。
#[derive(Debug, Clone)]
pub struct AggregateBatchError {
    /// 操作标签
    pub action: String,

    /// 虚拟机总数
    pub total: usize,

    /// 失败列表 (按提交顺序)
    pub failures: Vec<VmFailure>,

    /// 完整结果
    pub result: Box<BatchResult>,
}

impl AggregateBatchError {
    /// 失败的虚拟机名称
    pub fn failed_vms(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.vm_name.as_str()).collect()
    }
}

impl fmt::Display for AggregateBatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} 操作失败: {}/{} 个虚拟机",
            self.action,
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.vm_name, failure.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateBatchError {}

/// 归并执行结果，保持输入顺序
pub fn aggregate(outcomes: Vec<PerVmOutcome>, meta: BatchMeta) -> BatchResult {
    let failed = outcomes.iter().filter(|o| !o.success).count();

    BatchResult {
        action: meta.action,
        started_at: meta.started_at,
        duration_ms: meta.duration_ms,
        total: outcomes.len(),
        successful: outcomes.len() - failed,
        failed,
        overall_failed: failed > 0,
        outcomes,
    }
}
