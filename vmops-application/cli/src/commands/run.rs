//! 批量操作执行命令

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vmops_driver::{MemoryVmDriver, RestVmDriver, VmDriver};
use vmops_executor::{ActionDescriptor, ActionDispatcher, ParallelExecutor, VmOperation};

use crate::commands::output::print_batch_result;
use crate::config::CliConfig;
use crate::{DriverKind, RunArgs};

pub async fn handle(args: RunArgs) -> Result<()> {
    let config = CliConfig::load(args.config.as_deref())?;

    let descriptor = ActionDescriptor::from_args(&args.tokens).context("参数校验失败")?;
    let operation = ActionDispatcher::resolve(&descriptor).context("参数校验失败")?;

    let max_workers = args.max_workers.unwrap_or(config.executor.max_workers);
    let unit_timeout = match args.timeout {
        Some(secs) => Duration::from_secs(secs),
        None => config.unit_timeout().unwrap_or(Duration::ZERO),
    };

    if args.dry_run {
        print_plan(&descriptor, &operation, max_workers, unit_timeout);
        return Ok(());
    }

    match args.driver {
        DriverKind::Rest => {
            let driver = Arc::new(RestVmDriver::new(config.endpoint_config()));
            let outcome = execute(
                driver.clone(),
                &descriptor,
                max_workers,
                unit_timeout,
                &args.format,
            )
            .await;
            driver.logout_all().await;
            outcome
        }
        DriverKind::Memory => {
            info!("使用内存驱动");
            let driver = Arc::new(MemoryVmDriver::new());
            execute(driver, &descriptor, max_workers, unit_timeout, &args.format).await
        }
    }
}

async fn execute(
    driver: Arc<dyn VmDriver>,
    descriptor: &ActionDescriptor,
    max_workers: usize,
    unit_timeout: Duration,
    format: &str,
) -> Result<()> {
    let executor = ParallelExecutor::new(driver)
        .with_max_workers(max_workers)
        .with_unit_timeout(unit_timeout);

    let result = executor.execute_batch(descriptor).await?;
    print_batch_result(&result, format)?;

    // 任一虚拟机失败时以非零状态退出
    result.into_result()?;
    Ok(())
}

fn print_plan(
    descriptor: &ActionDescriptor,
    operation: &VmOperation,
    max_workers: usize,
    unit_timeout: Duration,
) {
    println!("{}", "执行计划 (dry-run)".cyan().bold());
    println!("  操作:     {} ({})", descriptor.label(), operation);
    println!("  端点:     {}", descriptor.connection().url);
    println!("  数据中心: {}", descriptor.connection().target_dc);
    println!("  最大并发: {}", max_workers.max(1));
    if unit_timeout.is_zero() {
        println!("  单元超时: 不限制");
    } else {
        println!("  单元超时: {} 秒", unit_timeout.as_secs());
    }
    println!("  虚拟机 ({}):", descriptor.vm_names().len());
    for name in descriptor.vm_names() {
        println!("    - {}", name);
    }
}
