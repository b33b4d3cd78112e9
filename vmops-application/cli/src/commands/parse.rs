//! 参数解析命令
//!
//! 输出解析后的动作描述 (密码不输出)，不访问管理端点。

use anyhow::{Context, Result};
use serde::Serialize;

use vmops_executor::{ActionDescriptor, ActionDispatcher, VmOperation};

use crate::commands::output::{print_json, print_yaml};
use crate::ParseArgs;

#[derive(Serialize)]
struct ParsedCommand<'a> {
    descriptor: &'a ActionDescriptor,
    operation: &'a VmOperation,
}

pub fn handle(args: ParseArgs) -> Result<()> {
    let descriptor = ActionDescriptor::from_args(&args.tokens).context("参数校验失败")?;
    let operation = ActionDispatcher::resolve(&descriptor).context("参数校验失败")?;

    let parsed = ParsedCommand {
        descriptor: &descriptor,
        operation: &operation,
    };

    match args.format.as_str() {
        "yaml" => print_yaml(&parsed),
        _ => print_json(&parsed),
    }
}
