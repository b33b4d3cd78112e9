//! 并行执行器
//!
//! 为每个虚拟机启动一个执行单元，通过信号量限制并发数，
//! 按提交顺序等待所有执行单元结束后汇总结果。

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vmops_common::ConnectionData;
use vmops_driver::{OperationError, VmDriver};

use crate::aggregator::{aggregate, BatchMeta, BatchResult, PerVmOutcome};
use crate::descriptor::ActionDescriptor;
use crate::dispatcher::{ActionDispatcher, VmOperation};
use crate::error::{BatchError, ValidationError};

/// 默认最大并发数
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// 并行执行器
pub struct ParallelExecutor {
    driver: Arc<dyn VmDriver>,
    max_workers: usize,
    unit_timeout: Option<Duration>,
}

impl ParallelExecutor {
    /// 创建执行器
    pub fn new(driver: Arc<dyn VmDriver>) -> Self {
        Self {
            driver,
            max_workers: DEFAULT_MAX_WORKERS,
            unit_timeout: None,
        }
    }

    /// 设置最大并发数 (至少为 1)
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// 设置单个执行单元的超时时间，零表示不限制
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout
    }

    /// 解析原始参数并执行
    pub async fn run<S: AsRef<str>>(&self, raw_args: &[S]) -> Result<BatchResult, BatchError> {
        let descriptor = ActionDescriptor::from_args(raw_args)?;
        self.execute(&descriptor).await
    }

    /// 执行批次，任一虚拟机失败时返回汇总错误
    pub async fn execute(&self, descriptor: &ActionDescriptor) -> Result<BatchResult, BatchError> {
        let result = self.execute_batch(descriptor).await?;
        Ok(result.into_result()?)
    }

    /// 执行批次并返回所有虚拟机的结果
    ///
    /// 只有校验错误会作为 `Err` 返回，各虚拟机的失败记录在结果中。
    pub async fn execute_batch(
        &self,
        descriptor: &ActionDescriptor,
    ) -> Result<BatchResult, ValidationError> {
        if descriptor.vm_names().is_empty() {
            return Err(ValidationError::EmptyVmList);
        }

        let operation = Arc::new(ActionDispatcher::resolve(descriptor)?);
        let connection = Arc::new(descriptor.connection().clone());
        let action = descriptor.label();

        info!(
            "开始批量操作: {} ({}), {} 个虚拟机, 最大并发 {}",
            action,
            operation,
            descriptor.vm_names().len(),
            self.max_workers
        );

        let started_at = Utc::now();
        let start_time = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));

        let handles: Vec<(String, JoinHandle<PerVmOutcome>)> = descriptor
            .vm_names()
            .iter()
            .map(|vm_name| {
                let handle = tokio::spawn(run_unit(
                    Arc::clone(&self.driver),
                    Arc::clone(&operation),
                    Arc::clone(&connection),
                    Arc::clone(&semaphore),
                    vm_name.clone(),
                    self.unit_timeout,
                ));
                (vm_name.clone(), handle)
            })
            .collect();

        // 按提交顺序等待，结果顺序与输入一致
        let mut outcomes = Vec::with_capacity(handles.len());
        for (vm_name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("执行单元异常终止: {} - {}", vm_name, e);
                    PerVmOutcome::failed(&vm_name, OperationError::Aborted(e.to_string()), 0)
                }
            };
            outcomes.push(outcome);
        }

        let result = aggregate(
            outcomes,
            BatchMeta {
                action,
                started_at,
                duration_ms: start_time.elapsed().as_millis() as u64,
            },
        );

        info!(
            "批量操作完成: {} 成功 / {} 失败, 耗时 {} ms",
            result.successful, result.failed, result.duration_ms
        );

        Ok(result)
    }
}

/// 单个执行单元：获取许可后执行操作，把结果转为 [`PerVmOutcome`]
async fn run_unit(
    driver: Arc<dyn VmDriver>,
    operation: Arc<VmOperation>,
    connection: Arc<ConnectionData>,
    semaphore: Arc<Semaphore>,
    vm_name: String,
    unit_timeout: Option<Duration>,
) -> PerVmOutcome {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            return PerVmOutcome::failed(&vm_name, OperationError::Aborted(e.to_string()), 0);
        }
    };

    debug!("执行单元开始: {} -> {}", vm_name, operation);
    let start = Instant::now();

    let call = operation.apply(driver.as_ref(), &vm_name, &connection);
    let result = match unit_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(OperationError::Timeout(format!(
                "{} 超过 {:?} 未完成",
                vm_name, limit
            ))),
        },
        None => call.await,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => debug!("执行单元完成: {} ({} ms)", vm_name, duration_ms),
        Err(e) => warn!("执行单元失败: {} - {}", vm_name, e),
    }

    PerVmOutcome::from_result(&vm_name, result, duration_ms)
}
