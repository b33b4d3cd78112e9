//! 驱动层错误定义

use thiserror::Error;

/// 单虚拟机操作错误
///
/// 由执行单元捕获并折叠进该虚拟机的执行结果，不会单独越过执行器边界。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("HTTP 错误: {0}")]
    HttpError(String),

    #[error("认证错误: {0}")]
    AuthError(String),

    #[error("API 错误 [{0}]: {1}")]
    ApiError(u16, String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("超时错误: {0}")]
    Timeout(String),

    #[error("资源不存在: {0}")]
    NotFound(String),

    #[error("资源已存在: {0}")]
    AlreadyExists(String),

    #[error("操作失败: {0}")]
    OperationFailed(String),

    #[error("执行单元异常终止: {0}")]
    Aborted(String),
}

/// 驱动层结果类型
pub type Result<T> = std::result::Result<T, OperationError>;
