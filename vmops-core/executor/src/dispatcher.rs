//! 操作分发
//!
//! 把动作描述映射为单虚拟机操作 [`VmOperation`]。子操作在这里校验，
//! 失败时不会有任何执行单元启动。

use serde::Serialize;
use std::fmt;

use vmops_common::{keys, ConnectionData};
use vmops_driver::models::ComputeType;
use vmops_driver::{CloneSpec, PowerState, SnapshotSpec, VmDriver};

use crate::descriptor::{ActionDescriptor, ActionKind};
use crate::error::ValidationError;

/// 单虚拟机操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum VmOperation {
    /// 从模板克隆，虚拟机名为新虚拟机名称
    Clone(CloneSpec),
    Delete,
    Power { state: PowerState },
    CreateSnapshot(SnapshotSpec),
    DeleteSnapshot { name: String },
    RestoreSnapshot { name: String },
}

impl VmOperation {
    /// 对单个虚拟机执行操作，恰好调用一次驱动方法
    pub async fn apply(
        &self,
        driver: &dyn VmDriver,
        vm_name: &str,
        conn: &ConnectionData,
    ) -> vmops_driver::Result<()> {
        match self {
            VmOperation::Clone(spec) => driver.clone_vm(vm_name, conn, spec).await,
            VmOperation::Delete => driver.delete_vm(vm_name, conn).await,
            VmOperation::Power { state } => driver.set_power(vm_name, conn, *state).await,
            VmOperation::CreateSnapshot(spec) => driver.create_snapshot(vm_name, conn, spec).await,
            VmOperation::DeleteSnapshot { name } => {
                driver.delete_snapshot(vm_name, conn, name).await
            }
            VmOperation::RestoreSnapshot { name } => {
                driver.restore_snapshot(vm_name, conn, name).await
            }
        }
    }
}

impl fmt::Display for VmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmOperation::Clone(spec) => write!(f, "clone from {}", spec.template),
            VmOperation::Delete => write!(f, "delete"),
            VmOperation::Power { state } => write!(f, "power {}", state),
            VmOperation::CreateSnapshot(spec) => write!(f, "create snapshot {}", spec.name),
            VmOperation::DeleteSnapshot { name } => write!(f, "delete snapshot {}", name),
            VmOperation::RestoreSnapshot { name } => write!(f, "restore snapshot {}", name),
        }
    }
}

/// 操作分发器
pub struct ActionDispatcher;

impl ActionDispatcher {
    /// 解析动作描述对应的单虚拟机操作
    pub fn resolve(descriptor: &ActionDescriptor) -> Result<VmOperation, ValidationError> {
        let params = descriptor.parameters();
        let kind = descriptor.action_kind();
        let sub_action = descriptor.sub_action();

        let unsupported = || ValidationError::UnsupportedSubAction {
            kind: kind.to_string(),
            sub_action: sub_action.to_string(),
        };

        match kind {
            ActionKind::CloneAndProvision => {
                // 计算资源类型在启动任何执行单元前校验
                let compute_type = params.get(keys::COMPUTE_TYPE).trim();
                ComputeType::parse(compute_type).map_err(|_| ValidationError::InvalidValue {
                    key: keys::COMPUTE_TYPE.to_string(),
                    value: compute_type.to_string(),
                })?;

                Ok(VmOperation::Clone(CloneSpec {
                    template: params.get(keys::CLONE_TEMPLATE).trim().to_string(),
                    compute_type: compute_type.to_string(),
                    compute_name: params.get(keys::COMPUTE_NAME).trim().to_string(),
                    description: params.get(keys::DESCRIPTION).to_string(),
                }))
            }

            // 删除操作的取值不参与分支
            ActionKind::DeleteVm => Ok(VmOperation::Delete),

            ActionKind::PowerOps => match sub_action.to_ascii_lowercase().as_str() {
                keys::START_VM_ACTION => Ok(VmOperation::Power {
                    state: PowerState::On,
                }),
                keys::STOP_VM_ACTION => Ok(VmOperation::Power {
                    state: PowerState::Off,
                }),
                _ => Err(unsupported()),
            },

            ActionKind::SnapshotOps => {
                let name = params.get(keys::SNAPSHOT_NAME).trim().to_string();
                match sub_action.to_ascii_lowercase().as_str() {
                    keys::CREATE_SNAPSHOT_ACTION => Ok(VmOperation::CreateSnapshot(SnapshotSpec {
                        name,
                        description: params.get(keys::DESCRIPTION).to_string(),
                    })),
                    keys::DELETE_SNAPSHOT_ACTION => Ok(VmOperation::DeleteSnapshot { name }),
                    keys::RESTORE_SNAPSHOT_ACTION => Ok(VmOperation::RestoreSnapshot { name }),
                    _ => Err(unsupported()),
                }
            }
        }
    }
}
