//! 执行器错误定义

use thiserror::Error;

use crate::aggregator::AggregateBatchError;

/// 参数校验错误
///
/// 在任何执行单元启动前返回，此时没有虚拟机被操作。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("缺少必需参数: {0}")]
    MissingArgument(String),

    #[error("选项缺少取值: {0}")]
    MissingValue(String),

    #[error("无法识别的参数: {0}")]
    UnexpectedToken(String),

    #[error("参数取值无效 {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("端点地址无效: {0}")]
    InvalidEndpoint(String),

    #[error("虚拟机列表为空")]
    EmptyVmList,

    #[error("未指定操作 (需要 -clonetemplate / -deletevm / -powerops / -snapshotOps 之一)")]
    NoAction,

    #[error("同时指定了多个操作: {0}")]
    ConflictingActions(String),

    #[error("{kind} 不支持子操作: {sub_action}")]
    UnsupportedSubAction { kind: String, sub_action: String },

    #[error("{kind} 缺少参数: {key}")]
    MissingParameter { kind: String, key: String },
}

/// 批量执行错误
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Aggregate(#[from] AggregateBatchError),
}

impl BatchError {
    /// 是否为执行前的校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, BatchError::Validation(_))
    }
}
