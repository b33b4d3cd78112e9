//! vmops 执行器
//!
//! 批量虚拟机操作的并行执行引擎：
//!
//! 1. 原始参数解析为 [`ActionDescriptor`]
//! 2. [`ActionDispatcher`] 校验子操作并确定单虚拟机操作
//! 3. [`ParallelExecutor`] 为每个虚拟机并发执行该操作
//! 4. [`aggregate`] 按输入顺序汇总为 [`BatchResult`]

pub mod aggregator;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod executor;

pub use aggregator::{
    aggregate, AggregateBatchError, BatchMeta, BatchResult, PerVmOutcome, VmFailure,
};
pub use descriptor::{parse_cmd_line, split_vm_list, ActionDescriptor, ActionKind, RawOptions};
pub use dispatcher::{ActionDispatcher, VmOperation};
pub use error::{BatchError, ValidationError};
pub use executor::{ParallelExecutor, DEFAULT_MAX_WORKERS};
