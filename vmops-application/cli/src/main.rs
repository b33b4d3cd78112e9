//! vmops CLI 应用

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Level};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "vmops")]
#[command(about = "vmops - 批量虚拟机生命周期操作工具", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行批量操作
    ///
    /// 示例: vmops run -- vmOpsTool -vCenterUrl https://vc/sdk -vCenterUserName u
    ///       -vCenterPassword p -targetdc DC -skipca true -vmList "vm1, vm2" -powerops start
    Run(RunArgs),

    /// 只解析并校验参数，不操作任何虚拟机
    Parse(ParseArgs),
}

/// 驱动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DriverKind {
    /// 管理端点 REST API
    Rest,
    /// 内存清单 (演练)
    Memory,
}

#[derive(Args)]
struct RunArgs {
    /// 配置文件路径
    #[arg(long)]
    config: Option<PathBuf>,

    /// 最大并发数
    #[arg(long)]
    max_workers: Option<usize>,

    /// 单个虚拟机操作超时（秒），0 表示不限制
    #[arg(long)]
    timeout: Option<u64>,

    /// 驱动
    #[arg(long, value_enum, default_value_t = DriverKind::Rest)]
    driver: DriverKind,

    /// 输出格式 (table/json/yaml)
    #[arg(short, long, default_value = "table")]
    format: String,

    /// 只打印执行计划
    #[arg(long)]
    dry_run: bool,

    /// 原始参数 (vmOpsTool -key value ...)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

#[derive(Args)]
struct ParseArgs {
    /// 输出格式 (json/yaml)
    #[arg(short, long, default_value = "json")]
    format: String,

    /// 原始参数 (vmOpsTool -key value ...)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    info!("vmops CLI 启动");

    // 处理命令
    match cli.command {
        Commands::Run(args) => commands::run::handle(args).await?,
        Commands::Parse(args) => commands::parse::handle(args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_collects_raw_tokens() {
        let cli = Cli::try_parse_from([
            "vmops", "run", "--driver", "memory", "--max-workers", "4", "--",
            "vmOpsTool", "-vmList", "vm1", "-powerops", "start",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.driver, DriverKind::Memory);
        assert_eq!(args.max_workers, Some(4));
        assert_eq!(args.format, "table");
        assert_eq!(args.tokens, ["vmOpsTool", "-vmList", "vm1", "-powerops", "start"]);
    }

    #[test]
    fn test_parse_tokens_after_marker() {
        let cli = Cli::try_parse_from([
            "vmops", "parse", "-f", "yaml", "vmOpsTool", "-clonetemplate", "dummyTemplate",
        ])
        .unwrap();

        let Commands::Parse(args) = cli.command else {
            panic!("expected parse");
        };
        assert_eq!(args.format, "yaml");
        assert_eq!(args.tokens, ["vmOpsTool", "-clonetemplate", "dummyTemplate"]);
    }
}
