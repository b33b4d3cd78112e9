//! 基于管理端点 REST API 的驱动实现

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use vmops_common::ConnectionData;

use crate::client::{EndpointClient, EndpointConfig};
use crate::error::{OperationError, Result};
use crate::models::{CloneVmRequest, ComputeType, Placement, VmPowerState, VmSummary};
use crate::{CloneSpec, PowerState, SnapshotSpec, VmDriver};

/// 登录结果单元，成功或失败都只计算一次
type SessionCell = Arc<OnceCell<Result<Arc<EndpointClient>>>>;

/// REST 驱动
///
/// 按 (用户, 端点, 证书校验) 缓存登录结果，同一批次的所有执行单元共享一个会话。
/// 登录失败同样被缓存，后续执行单元直接返回同一错误。
pub struct RestVmDriver {
    /// 客户端配置 (证书校验由连接参数决定)
    config: EndpointConfig,

    /// 登录结果缓存
    sessions: Mutex<HashMap<String, SessionCell>>,
}

impl RestVmDriver {
    /// 创建 REST 驱动
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 获取 (必要时创建并登录) 连接对应的客户端
    ///
    /// 缓存锁只在取得会话单元期间持有，登录在锁外进行。
    async fn client(&self, conn: &ConnectionData) -> Result<Arc<EndpointClient>> {
        let cell = {
            let mut sessions = self.sessions.lock().await;
            Arc::clone(sessions.entry(conn.session_key()).or_default())
        };

        let session = cell.get_or_init(|| self.login(conn)).await;
        session.clone()
    }

    async fn login(&self, conn: &ConnectionData) -> Result<Arc<EndpointClient>> {
        let config = EndpointConfig {
            verify_ssl: !conn.skip_ca_check,
            ..self.config.clone()
        };
        let client = EndpointClient::new(&conn.url, config)?;
        client.login(&conn.user_name, &conn.password).await?;
        Ok(Arc::new(client))
    }

    /// 注销所有缓存的会话并清空缓存
    pub async fn logout_all(&self) {
        let cells: Vec<SessionCell> = self.sessions.lock().await.drain().map(|(_, c)| c).collect();

        for cell in cells {
            if let Some(Ok(client)) = cell.get() {
                if let Err(e) = client.logout().await {
                    debug!("注销会话失败 ({}): {}", client.base_url(), e);
                }
            }
        }
    }

    /// 解析目标数据中心并查找虚拟机，不存在时返回 NotFound
    async fn require_vm(
        &self,
        client: &EndpointClient,
        conn: &ConnectionData,
        vm_name: &str,
    ) -> Result<VmSummary> {
        let datacenter_id = client.inventory().datacenter_id(&conn.target_dc).await?;
        client
            .vm()
            .find(vm_name, &datacenter_id)
            .await?
            .ok_or_else(|| OperationError::NotFound(format!("虚拟机 {}", vm_name)))
    }

    async fn current_power(&self, client: &EndpointClient, vm: &VmSummary) -> Result<VmPowerState> {
        match vm.power_state {
            Some(state) => Ok(state),
            None => client.vm().power_state(&vm.vm).await,
        }
    }
}

#[async_trait]
impl VmDriver for RestVmDriver {
    async fn clone_vm(&self, vm_name: &str, conn: &ConnectionData, spec: &CloneSpec) -> Result<()> {
        let compute_type = ComputeType::parse(&spec.compute_type)?;
        let client = self.client(conn).await?;
        let datacenter_id = client.inventory().datacenter_id(&conn.target_dc).await?;

        if client.vm().find(vm_name, &datacenter_id).await?.is_some() {
            return Err(OperationError::AlreadyExists(format!("虚拟机 {}", vm_name)));
        }

        let template = client
            .vm()
            .find(&spec.template, &datacenter_id)
            .await?
            .ok_or_else(|| OperationError::NotFound(format!("模板 {}", spec.template)))?;

        let compute_id = client
            .inventory()
            .compute_id(compute_type, &spec.compute_name, &datacenter_id)
            .await?;

        let req = CloneVmRequest {
            name: vm_name.to_string(),
            source: template.vm,
            placement: Placement::new(compute_type, &compute_id),
            power_on: true,
            description: Some(spec.description.clone()).filter(|d| !d.is_empty()),
        };

        let vm_id = client.vm().clone_vm(&req).await?;
        info!("克隆完成: {} ({})", vm_name, vm_id);
        Ok(())
    }

    async fn delete_vm(&self, vm_name: &str, conn: &ConnectionData) -> Result<()> {
        let client = self.client(conn).await?;
        let vm = self.require_vm(&client, conn, vm_name).await?;

        // 运行中的虚拟机需先关机
        if self.current_power(&client, &vm).await? != VmPowerState::PoweredOff {
            client.vm().set_power(&vm.vm, PowerState::Off).await?;
        }

        client.vm().delete(&vm.vm).await
    }

    async fn set_power(&self, vm_name: &str, conn: &ConnectionData, state: PowerState) -> Result<()> {
        let client = self.client(conn).await?;
        let vm = self.require_vm(&client, conn, vm_name).await?;

        let current = self.current_power(&client, &vm).await?;
        let already = matches!(
            (state, current),
            (PowerState::On, VmPowerState::PoweredOn) | (PowerState::Off, VmPowerState::PoweredOff)
        );
        if already {
            debug!("虚拟机 {} 已处于目标电源状态 {}", vm_name, state);
            return Ok(());
        }

        client.vm().set_power(&vm.vm, state).await
    }

    async fn create_snapshot(
        &self,
        vm_name: &str,
        conn: &ConnectionData,
        spec: &SnapshotSpec,
    ) -> Result<()> {
        let client = self.client(conn).await?;
        let vm = self.require_vm(&client, conn, vm_name).await?;

        let description = Some(spec.description.as_str()).filter(|d| !d.is_empty());
        client.snapshot().create(&vm.vm, &spec.name, description).await?;
        Ok(())
    }

    async fn delete_snapshot(
        &self,
        vm_name: &str,
        conn: &ConnectionData,
        snapshot_name: &str,
    ) -> Result<()> {
        let client = self.client(conn).await?;
        let vm = self.require_vm(&client, conn, vm_name).await?;

        let snapshot = client
            .snapshot()
            .find(&vm.vm, snapshot_name)
            .await?
            .ok_or_else(|| OperationError::NotFound(format!("快照 {}", snapshot_name)))?;

        client.snapshot().delete(&vm.vm, &snapshot.snapshot).await
    }

    async fn restore_snapshot(
        &self,
        vm_name: &str,
        conn: &ConnectionData,
        snapshot_name: &str,
    ) -> Result<()> {
        let client = self.client(conn).await?;
        let vm = self.require_vm(&client, conn, vm_name).await?;

        let snapshot = client
            .snapshot()
            .find(&vm.vm, snapshot_name)
            .await?
            .ok_or_else(|| OperationError::NotFound(format!("快照 {}", snapshot_name)))?;

        client.snapshot().revert(&vm.vm, &snapshot.snapshot).await
    }
}
