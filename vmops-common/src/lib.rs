//! vmops 通用类型定义
//!
//! 此 crate 包含驱动层 (vmops-driver)、执行器 (vmops-executor) 与 CLI 共享的类型：
//! - 命令行选项键 ([`keys`])
//! - 管理端点连接参数 ([`ConnectionData`])
//! - 动作参数表 ([`ActionParameters`])

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 命令行选项键
///
/// 原始参数格式: `vmOpsTool -key value -key value ...`
pub mod keys {
    /// 工具名标记，解析时丢弃
    pub const VM_OPS_TOOL: &str = "vmOpsTool";

    // --- 连接参数 ---
    pub const V_CENTER_URL: &str = "-vCenterUrl";
    pub const V_CENTER_USER_NAME: &str = "-vCenterUserName";
    pub const V_CENTER_PASSWORD: &str = "-vCenterPassword";
    pub const TARGET_DC: &str = "-targetdc";
    pub const SKIP_CA_CHECK: &str = "-skipca";

    /// 虚拟机列表（逗号分隔）
    pub const VM_LIST: &str = "-vmList";

    // --- 动作标志 ---
    pub const CLONE_TEMPLATE: &str = "-clonetemplate";
    pub const DELETE_VM: &str = "-deletevm";
    pub const POWER_OPS: &str = "-powerops";
    pub const SNAPSHOT_OPS: &str = "-snapshotOps";

    // --- 动作参数 ---
    pub const COMPUTE_TYPE: &str = "-computetype";
    pub const COMPUTE_NAME: &str = "-computename";
    pub const DESCRIPTION: &str = "-description";
    pub const SNAPSHOT_NAME: &str = "-snapshotName";

    // --- 子动作取值 ---
    pub const DELETE_VM_ACTION: &str = "delete";
    pub const START_VM_ACTION: &str = "start";
    pub const STOP_VM_ACTION: &str = "stop";
    pub const CREATE_SNAPSHOT_ACTION: &str = "create";
    pub const DELETE_SNAPSHOT_ACTION: &str = "delete";
    pub const RESTORE_SNAPSHOT_ACTION: &str = "restore";

    /// 所有可识别的选项键
    pub const RECOGNIZED: &[&str] = &[
        V_CENTER_URL,
        V_CENTER_USER_NAME,
        V_CENTER_PASSWORD,
        TARGET_DC,
        SKIP_CA_CHECK,
        VM_LIST,
        CLONE_TEMPLATE,
        DELETE_VM,
        POWER_OPS,
        SNAPSHOT_OPS,
        COMPUTE_TYPE,
        COMPUTE_NAME,
        DESCRIPTION,
        SNAPSHOT_NAME,
    ];

    /// 动作参数键（进入 [`super::ActionParameters`]）
    pub const PARAMETERS: &[&str] = &[
        CLONE_TEMPLATE,
        COMPUTE_TYPE,
        COMPUTE_NAME,
        DESCRIPTION,
        SNAPSHOT_NAME,
    ];

    /// 是否为可识别的选项键
    pub fn is_recognized(key: &str) -> bool {
        RECOGNIZED.contains(&key)
    }
}

/// 管理端点连接参数
///
/// 批量执行期间以 `Arc<ConnectionData>` 只读共享给所有执行单元。
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionData {
    /// 端点 URL
    pub url: String,

    /// 用户名
    pub user_name: String,

    /// 密码
    #[serde(skip_serializing)]
    pub password: String,

    /// 目标数据中心
    pub target_dc: String,

    /// 跳过证书校验
    pub skip_ca_check: bool,
}

impl ConnectionData {
    pub fn new(
        url: &str,
        user_name: &str,
        password: &str,
        target_dc: &str,
        skip_ca_check: bool,
    ) -> Self {
        Self {
            url: url.to_string(),
            user_name: user_name.to_string(),
            password: password.to_string(),
            target_dc: target_dc.to_string(),
            skip_ca_check,
        }
    }

    /// 会话缓存键 (用户@端点 + 证书校验方式)
    pub fn session_key(&self) -> String {
        let tls = if self.skip_ca_check { "insecure" } else { "verified" };
        format!("{}@{}#{}", self.user_name, self.url, tls)
    }
}

// 密码不进日志
impl fmt::Debug for ConnectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionData")
            .field("url", &self.url)
            .field("user_name", &self.user_name)
            .field("password", &"******")
            .field("target_dc", &self.target_dc)
            .field("skip_ca_check", &self.skip_ca_check)
            .finish()
    }
}

/// 动作参数表 (选项键 -> 值)
///
/// 可选键缺失时读作空字符串。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionParameters(BTreeMap<String, String>);

impl ActionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取参数，缺失时返回空字符串
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// 参数是否存在且非空白
    pub fn has_value(&self, key: &str) -> bool {
        !self.get(key).trim().is_empty()
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ActionParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_debug_hides_password() {
        let conn = ConnectionData::new("https://vc.local/sdk", "admin", "secret~1", "DC1", true);
        let text = format!("{:?}", conn);
        assert!(!text.contains("secret~1"));
        assert!(text.contains("admin"));
    }

    #[test]
    fn test_connection_serialize_skips_password() {
        let conn = ConnectionData::new("https://vc.local/sdk", "admin", "secret~1", "DC1", false);
        let json = serde_json::to_string(&conn).unwrap();
        assert!(!json.contains("secret~1"));
        assert!(json.contains("DC1"));
    }

    #[test]
    fn test_session_key_separates_tls_mode() {
        let verified = ConnectionData::new("https://vc/sdk", "admin", "pwd", "DC", false);
        let insecure = ConnectionData::new("https://vc/sdk", "admin", "pwd", "DC", true);
        let other_dc = ConnectionData::new("https://vc/sdk", "admin", "pwd", "DC2", false);

        assert_ne!(verified.session_key(), insecure.session_key());
        assert_eq!(verified.session_key(), other_dc.session_key());
        assert!(!insecure.session_key().contains("pwd"));
    }

    #[test]
    fn test_parameters_default_to_empty() {
        let mut params = ActionParameters::new();
        params.insert(keys::SNAPSHOT_NAME, "Snapshot1");

        assert_eq!(params.get(keys::SNAPSHOT_NAME), "Snapshot1");
        assert_eq!(params.get(keys::DESCRIPTION), "");
        assert!(params.has_value(keys::SNAPSHOT_NAME));
        assert!(!params.has_value(keys::DESCRIPTION));
    }

    #[test]
    fn test_recognized_keys() {
        assert!(keys::is_recognized(keys::POWER_OPS));
        assert!(!keys::is_recognized("-invalidOps"));
        assert!(!keys::is_recognized(keys::VM_OPS_TOOL));
    }
}
