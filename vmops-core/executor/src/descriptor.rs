//! 动作描述
//!
//! 将原始命令行参数解析为不可变的 [`ActionDescriptor`]：
//!
//! ```text
//! vmOpsTool -vCenterUrl https://vc/sdk -vCenterUserName u -vCenterPassword p
//!           -targetdc DC -skipca true -vmList "vm1, vm2" -powerops start
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use vmops_common::{keys, ActionParameters, ConnectionData};

use crate::error::ValidationError;

/// 原始选项表 (键 -> 值)
pub type RawOptions = BTreeMap<String, String>;

/// 把原始参数解析为选项表
///
/// 开头的 `vmOpsTool` 标记会被丢弃。键以 `-` 开头，取值为紧随其后的参数 (可为空)。
/// 重复出现的键以最后一次为准。未知键记录警告后保留在表中。
pub fn parse_cmd_line<S: AsRef<str>>(args: &[S]) -> Result<RawOptions, ValidationError> {
    let mut tokens = args.iter().map(|arg| arg.as_ref()).peekable();
    if tokens.peek() == Some(&keys::VM_OPS_TOOL) {
        tokens.next();
    }

    let mut options = RawOptions::new();
    while let Some(key) = tokens.next() {
        if !key.starts_with('-') {
            return Err(ValidationError::UnexpectedToken(key.to_string()));
        }

        let value = tokens
            .next()
            .ok_or_else(|| ValidationError::MissingValue(key.to_string()))?;

        if !keys::is_recognized(key) {
            warn!("忽略未知选项: {}", key);
        }

        options.insert(key.to_string(), value.to_string());
    }

    Ok(options)
}

/// 把逗号分隔的虚拟机列表拆分为名称序列 (去除空白，丢弃空项，保留重复项)
pub fn split_vm_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// 克隆并启动
    CloneAndProvision,
    /// 删除虚拟机
    DeleteVm,
    /// 电源操作
    PowerOps,
    /// 快照操作
    SnapshotOps,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::CloneAndProvision,
        ActionKind::DeleteVm,
        ActionKind::PowerOps,
        ActionKind::SnapshotOps,
    ];

    /// 选择该操作的选项键
    pub fn flag(&self) -> &'static str {
        match self {
            ActionKind::CloneAndProvision => keys::CLONE_TEMPLATE,
            ActionKind::DeleteVm => keys::DELETE_VM,
            ActionKind::PowerOps => keys::POWER_OPS,
            ActionKind::SnapshotOps => keys::SNAPSHOT_OPS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::CloneAndProvision => "clone",
            ActionKind::DeleteVm => "delete",
            ActionKind::PowerOps => "power",
            ActionKind::SnapshotOps => "snapshot",
        }
    }

    /// 必需的动作参数
    pub fn required_parameters(&self) -> &'static [&'static str] {
        match self {
            ActionKind::CloneAndProvision => {
                &[keys::CLONE_TEMPLATE, keys::COMPUTE_TYPE, keys::COMPUTE_NAME]
            }
            ActionKind::SnapshotOps => &[keys::SNAPSHOT_NAME],
            ActionKind::DeleteVm | ActionKind::PowerOps => &[],
        }
    }

    /// 根据选项表中出现的操作键确定操作类型 (必须恰好一个)
    fn detect(options: &RawOptions) -> Result<Self, ValidationError> {
        let present: Vec<ActionKind> = Self::ALL
            .into_iter()
            .filter(|kind| options.contains_key(kind.flag()))
            .collect();

        match present.as_slice() {
            [] => Err(ValidationError::NoAction),
            [kind] => Ok(*kind),
            many => Err(ValidationError::ConflictingActions(
                many.iter().map(|k| k.flag()).collect::<Vec<_>>().join(", "),
            )),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 动作描述：对哪些虚拟机做什么
///
/// 构造后不可变。子操作是否合法由 [`crate::ActionDispatcher`] 在执行前校验。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    vm_names: Vec<String>,
    action_kind: ActionKind,
    sub_action: String,
    parameters: ActionParameters,
    connection: ConnectionData,
}

impl ActionDescriptor {
    /// 构造并校验动作描述
    pub fn new(
        vm_names: Vec<String>,
        action_kind: ActionKind,
        sub_action: impl Into<String>,
        parameters: ActionParameters,
        connection: ConnectionData,
    ) -> Result<Self, ValidationError> {
        if vm_names.is_empty() {
            return Err(ValidationError::EmptyVmList);
        }
        if let Some(blank) = vm_names.iter().find(|name| name.trim().is_empty()) {
            return Err(ValidationError::InvalidValue {
                key: keys::VM_LIST.to_string(),
                value: blank.clone(),
            });
        }

        validate_connection(&connection)?;

        for key in action_kind.required_parameters() {
            if !parameters.has_value(key) {
                return Err(ValidationError::MissingParameter {
                    kind: action_kind.to_string(),
                    key: key.to_string(),
                });
            }
        }

        Ok(Self {
            vm_names,
            action_kind,
            sub_action: sub_action.into(),
            parameters,
            connection,
        })
    }

    /// 从原始命令行参数构造
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ValidationError> {
        Self::from_options(&parse_cmd_line(args)?)
    }

    /// 从选项表构造
    pub fn from_options(options: &RawOptions) -> Result<Self, ValidationError> {
        let connection = connection_from(options)?;

        let vm_list = required(options, keys::VM_LIST)?;
        let vm_names = split_vm_list(vm_list);
        if vm_names.is_empty() {
            return Err(ValidationError::EmptyVmList);
        }

        let action_kind = ActionKind::detect(options)?;

        // 克隆操作的取值是模板名，作为参数而不是子操作
        let sub_action = match action_kind {
            ActionKind::CloneAndProvision => String::new(),
            kind => options
                .get(kind.flag())
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
        };

        let parameters: ActionParameters = keys::PARAMETERS
            .iter()
            .filter_map(|key| options.get(*key).map(|value| (*key, value.as_str())))
            .collect();

        Self::new(vm_names, action_kind, sub_action, parameters, connection)
    }

    pub fn vm_names(&self) -> &[String] {
        &self.vm_names
    }

    pub fn action_kind(&self) -> ActionKind {
        self.action_kind
    }

    pub fn sub_action(&self) -> &str {
        &self.sub_action
    }

    pub fn parameters(&self) -> &ActionParameters {
        &self.parameters
    }

    pub fn connection(&self) -> &ConnectionData {
        &self.connection
    }

    /// 操作标签，例如 `power start`、`clone`
    pub fn label(&self) -> String {
        match self.action_kind {
            ActionKind::PowerOps | ActionKind::SnapshotOps if !self.sub_action.is_empty() => {
                format!("{} {}", self.action_kind.label(), self.sub_action)
            }
            kind => kind.label().to_string(),
        }
    }
}

fn required<'a>(options: &'a RawOptions, key: &str) -> Result<&'a str, ValidationError> {
    options
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ValidationError::MissingArgument(key.to_string()))
}

fn connection_from(options: &RawOptions) -> Result<ConnectionData, ValidationError> {
    let url = required(options, keys::V_CENTER_URL)?.trim();
    let user_name = required(options, keys::V_CENTER_USER_NAME)?;
    let password = required(options, keys::V_CENTER_PASSWORD)?;
    let target_dc = required(options, keys::TARGET_DC)?.trim();
    let skip_ca = required(options, keys::SKIP_CA_CHECK)?.trim();

    let skip_ca_check = match skip_ca.to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => {
            return Err(ValidationError::InvalidValue {
                key: keys::SKIP_CA_CHECK.to_string(),
                value: skip_ca.to_string(),
            })
        }
    };

    let connection = ConnectionData::new(url, user_name, password, target_dc, skip_ca_check);
    validate_connection(&connection)?;
    Ok(connection)
}

/// 连接参数校验：各字段非空，端点为 http(s) URL
fn validate_connection(connection: &ConnectionData) -> Result<(), ValidationError> {
    let fields = [
        (keys::V_CENTER_URL, &connection.url),
        (keys::V_CENTER_USER_NAME, &connection.user_name),
        (keys::V_CENTER_PASSWORD, &connection.password),
        (keys::TARGET_DC, &connection.target_dc),
    ];
    if let Some((key, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ValidationError::MissingArgument(key.to_string()));
    }

    validate_endpoint(&connection.url)
}

fn validate_endpoint(value: &str) -> Result<(), ValidationError> {
    let parsed =
        url::Url::parse(value).map_err(|e| ValidationError::InvalidEndpoint(format!("{}: {}", value, e)))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(ValidationError::InvalidEndpoint(value.to_string())),
    }
}
