//! 快照管理 API
//!
//! 提供虚拟机快照管理功能，包括：
//! - 创建快照
//! - 删除快照
//! - 使用快照恢复
//! - 查询快照列表

use reqwest::Method;
use tracing::info;

use crate::client::EndpointClient;
use crate::error::Result;
use crate::models::{CreateSnapshotRequest, SnapshotSummary};

/// 快照管理 API
pub struct SnapshotApi<'a> {
    client: &'a EndpointClient,
}

impl<'a> SnapshotApi<'a> {
    /// 创建新的快照 API 实例
    pub(crate) fn new(client: &'a EndpointClient) -> Self {
        Self { client }
    }

    /// 获取虚拟机所有快照
    pub async fn list(&self, vm_id: &str) -> Result<Vec<SnapshotSummary>> {
        self.client
            .request(
                Method::GET,
                &format!("/api/vcenter/vm/{}/snapshots", vm_id),
                &[],
                None::<()>,
            )
            .await
    }

    /// 按名称查找快照
    pub async fn find(&self, vm_id: &str, name: &str) -> Result<Option<SnapshotSummary>> {
        let snapshots = self.list(vm_id).await?;
        Ok(snapshots.into_iter().find(|s| s.name == name))
    }

    /// 创建快照
    ///
    /// # Arguments
    /// * `vm_id` - 虚拟机 ID
    /// * `name` - 快照名称
    /// * `description` - 快照描述 (可选)
    pub async fn create(&self, vm_id: &str, name: &str, description: Option<&str>) -> Result<String> {
        info!("创建虚拟机快照: {} -> {}", vm_id, name);
        let req = CreateSnapshotRequest {
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            memory: false,
        };
        self.client
            .request(
                Method::POST,
                &format!("/api/vcenter/vm/{}/snapshots", vm_id),
                &[],
                Some(req),
            )
            .await
    }

    /// 删除快照
    pub async fn delete(&self, vm_id: &str, snapshot_id: &str) -> Result<()> {
        info!("删除快照: {} / {}", vm_id, snapshot_id);
        self.client
            .execute(
                Method::DELETE,
                &format!("/api/vcenter/vm/{}/snapshots/{}", vm_id, snapshot_id),
                &[],
                None::<()>,
            )
            .await
    }

    /// 使用快照恢复
    pub async fn revert(&self, vm_id: &str, snapshot_id: &str) -> Result<()> {
        info!("使用快照恢复: {} / {}", vm_id, snapshot_id);
        self.client
            .execute(
                Method::POST,
                &format!("/api/vcenter/vm/{}/snapshots/{}", vm_id, snapshot_id),
                &[("action", "revert")],
                None::<()>,
            )
            .await
    }
}
