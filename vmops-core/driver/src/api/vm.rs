//! 虚拟机管理 API
//!
//! 提供按名称查找、克隆、删除、电源操作。

use reqwest::Method;
use tracing::info;

use crate::client::EndpointClient;
use crate::error::Result;
use crate::models::{CloneVmRequest, PowerInfo, VmPowerState, VmSummary};
use crate::PowerState;

/// 虚拟机管理 API
pub struct VmApi<'a> {
    client: &'a EndpointClient,
}

impl<'a> VmApi<'a> {
    /// 创建新的虚拟机 API 实例
    pub(crate) fn new(client: &'a EndpointClient) -> Self {
        Self { client }
    }

    /// 在数据中心内按名称查找虚拟机 (模板同样适用)
    pub async fn find(&self, name: &str, datacenter_id: &str) -> Result<Option<VmSummary>> {
        let vms: Vec<VmSummary> = self
            .client
            .request(
                Method::GET,
                "/api/vcenter/vm",
                &[("names", name), ("datacenters", datacenter_id)],
                None::<()>,
            )
            .await?;

        Ok(vms.into_iter().find(|vm| vm.name == name))
    }

    /// 克隆虚拟机，返回新虚拟机 ID
    pub async fn clone_vm(&self, req: &CloneVmRequest) -> Result<String> {
        info!("克隆虚拟机: {} <- {}", req.name, req.source);
        self.client
            .request(
                Method::POST,
                "/api/vcenter/vm",
                &[("action", "clone")],
                Some(req),
            )
            .await
    }

    /// 删除虚拟机
    pub async fn delete(&self, vm_id: &str) -> Result<()> {
        info!("删除虚拟机: {}", vm_id);
        self.client
            .execute(
                Method::DELETE,
                &format!("/api/vcenter/vm/{}", vm_id),
                &[],
                None::<()>,
            )
            .await
    }

    /// 查询电源状态
    pub async fn power_state(&self, vm_id: &str) -> Result<VmPowerState> {
        let info: PowerInfo = self
            .client
            .request(
                Method::GET,
                &format!("/api/vcenter/vm/{}/power", vm_id),
                &[],
                None::<()>,
            )
            .await?;
        Ok(info.state)
    }

    /// 启动或关闭虚拟机
    pub async fn set_power(&self, vm_id: &str, state: PowerState) -> Result<()> {
        let action = match state {
            PowerState::On => "start",
            PowerState::Off => "stop",
        };
        info!("虚拟机电源操作: {} -> {}", vm_id, action);
        self.client
            .execute(
                Method::POST,
                &format!("/api/vcenter/vm/{}/power", vm_id),
                &[("action", action)],
                None::<()>,
            )
            .await
    }
}
