//! CLI 通用输出格式化模块
//!
//! 提供 table/json/yaml 三种输出格式的通用实现

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use vmops_executor::{BatchResult, PerVmOutcome};

/// 可输出为表格行的数据 trait
pub trait TableRow {
    /// 返回表格列标题
    fn headers() -> Vec<&'static str>;

    /// 返回该项的表格行数据
    fn row(&self) -> Vec<String>;
}

impl TableRow for PerVmOutcome {
    fn headers() -> Vec<&'static str> {
        vec!["虚拟机", "状态", "耗时(ms)", "错误"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.vm_name.clone(),
            if self.success { "✅ 成功" } else { "❌ 失败" }.to_string(),
            self.duration_ms.to_string(),
            self.error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        ]
    }
}

/// 表格格式输出
pub fn print_table<T: TableRow>(items: &[T]) {
    let headers = T::headers();

    // 打印表头
    let header_line: String = headers
        .iter()
        .map(|h| format!("{:<20}", h))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", header_line);
    println!("{}", "-".repeat(header_line.len()));

    // 打印数据行
    for item in items {
        let row_line: String = item
            .row()
            .iter()
            .map(|c| format!("{:<20}", c))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", row_line);
    }
}

/// JSON 格式输出
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// YAML 格式输出
pub fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

/// 输出批量执行结果
pub fn print_batch_result(result: &BatchResult, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", result.to_json()?),
        "yaml" => print!("{}", result.to_yaml()?),
        _ => {
            println!();
            println!("{} {}", "操作:".bold(), result.action);
            println!();
            print_table(&result.outcomes);
            println!();

            let summary = format!(
                "总计 {} | 成功 {} | 失败 {} | 耗时 {} ms",
                result.total, result.successful, result.failed, result.duration_ms
            );
            if result.overall_failed {
                println!("{} {}", "❌".red(), summary.red());
            } else {
                println!("{} {}", "✅".green(), summary.green());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmops_driver::OperationError;

    #[test]
    fn test_outcome_row() {
        let ok = PerVmOutcome::succeeded("vm1", 12);
        assert_eq!(ok.row(), vec!["vm1", "✅ 成功", "12", ""]);

        let failed = PerVmOutcome::failed("vm3", OperationError::NotFound("虚拟机 vm3".to_string()), 4);
        let row = failed.row();
        assert_eq!(row[1], "❌ 失败");
        assert_eq!(row[3], "资源不存在: 虚拟机 vm3");
        assert_eq!(row.len(), PerVmOutcome::headers().len());
    }
}
