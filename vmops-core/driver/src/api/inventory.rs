//! 清单查询 API
//!
//! 数据中心与计算资源 (主机 / 集群 / 资源池) 的名称到 ID 解析。

use reqwest::Method;

use crate::client::EndpointClient;
use crate::error::{OperationError, Result};
use crate::models::{ComputeType, DatacenterSummary};

/// 清单查询 API
pub struct InventoryApi<'a> {
    client: &'a EndpointClient,
}

impl<'a> InventoryApi<'a> {
    pub(crate) fn new(client: &'a EndpointClient) -> Self {
        Self { client }
    }

    /// 按名称解析数据中心 ID
    pub async fn datacenter_id(&self, name: &str) -> Result<String> {
        let datacenters: Vec<DatacenterSummary> = self
            .client
            .request(
                Method::GET,
                "/api/vcenter/datacenter",
                &[("names", name)],
                None::<()>,
            )
            .await?;

        datacenters
            .into_iter()
            .find(|dc| dc.name == name)
            .map(|dc| dc.datacenter)
            .ok_or_else(|| OperationError::NotFound(format!("数据中心 {}", name)))
    }

    /// 按名称解析计算资源 ID
    pub async fn compute_id(
        &self,
        compute_type: ComputeType,
        name: &str,
        datacenter_id: &str,
    ) -> Result<String> {
        let items: Vec<serde_json::Value> = self
            .client
            .request(
                Method::GET,
                &format!("/api/vcenter/{}", compute_type.api_path()),
                &[("names", name), ("datacenters", datacenter_id)],
                None::<()>,
            )
            .await?;

        items
            .iter()
            .filter(|item| item["name"].as_str() == Some(name))
            .find_map(|item| item[compute_type.id_field()].as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| OperationError::NotFound(format!("计算资源 {}", name)))
    }
}
