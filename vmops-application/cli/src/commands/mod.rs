//! CLI 命令处理模块

pub mod output; // 通用输出格式化
pub mod parse;
pub mod run;
