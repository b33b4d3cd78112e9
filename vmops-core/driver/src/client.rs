//! 管理端点客户端核心实现

use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{InventoryApi, SnapshotApi, VmApi};
use crate::error::{OperationError, Result};

/// 会话令牌请求头
const SESSION_HEADER: &str = "vmware-api-session-id";

/// 管理端点客户端配置
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// 连接超时（秒）
    pub connect_timeout: u64,

    /// 请求超时（秒）
    pub request_timeout: u64,

    /// 是否验证 SSL 证书
    pub verify_ssl: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 10,
            request_timeout: 300,
            verify_ssl: true,
        }
    }
}

/// 管理端点客户端
pub struct EndpointClient {
    /// API 基础 URL (scheme://host[:port])
    base_url: String,

    /// HTTP 客户端
    http_client: Client,

    /// 会话令牌
    session_token: Arc<RwLock<Option<String>>>,
}

impl EndpointClient {
    /// 创建新的端点客户端
    ///
    /// `endpoint_url` 可以带路径 (如 `https://vc.local/sdk/vimservice`)，
    /// 只保留其 origin 部分作为 API 基础地址。
    pub fn new(endpoint_url: &str, config: EndpointConfig) -> Result<Self> {
        let base_url = Self::base_url_of(endpoint_url)?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| OperationError::HttpError(e.to_string()))?;

        Ok(Self {
            base_url,
            http_client,
            session_token: Arc::new(RwLock::new(None)),
        })
    }

    /// 从端点 URL 提取 API 基础地址
    pub fn base_url_of(endpoint_url: &str) -> Result<String> {
        let url = Url::parse(endpoint_url)
            .map_err(|e| OperationError::ConfigError(format!("无效的端点 URL {}: {}", endpoint_url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(OperationError::ConfigError(format!(
                "不支持的端点协议: {}",
                url.scheme()
            )));
        }

        Ok(url.origin().ascii_serialization())
    }

    /// 认证登录
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        info!("端点客户端登录: {} -> {}", username, self.base_url);

        let login_url = format!("{}/api/session", self.base_url);
        let response = self
            .http_client
            .post(&login_url)
            .basic_auth(username, Some(password))
            .send()
            .await
            .map_err(|e| OperationError::HttpError(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(OperationError::AuthError(format!(
                "端点登录失败: {} ({})",
                username, status
            )));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误响应".to_string());
            return Err(OperationError::ApiError(status.as_u16(), error_text));
        }

        let token: String = response
            .json()
            .await
            .map_err(|e| OperationError::ParseError(e.to_string()))?;

        *self.session_token.write().await = Some(token);

        info!("端点客户端登录成功");
        Ok(())
    }

    /// 注销登出
    pub async fn logout(&self) -> Result<()> {
        if self.session_token.read().await.is_none() {
            return Ok(());
        }

        info!("端点客户端登出: {}", self.base_url);
        let result = self.execute(Method::DELETE, "/api/session", &[], None::<()>).await;
        *self.session_token.write().await = None;
        result
    }

    /// 获取虚拟机管理 API
    pub fn vm(&self) -> VmApi<'_> {
        VmApi::new(self)
    }

    /// 获取快照管理 API
    pub fn snapshot(&self) -> SnapshotApi<'_> {
        SnapshotApi::new(self)
    }

    /// 获取清单查询 API (数据中心、计算资源)
    pub fn inventory(&self) -> InventoryApi<'_> {
        InventoryApi::new(self)
    }

    /// 发送请求并解析 JSON 响应
    pub(crate) async fn request<T: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<T>,
    ) -> Result<R> {
        let response = self.send(method, path, query, body).await?;

        response
            .json::<R>()
            .await
            .map_err(|e| OperationError::ParseError(e.to_string()))
    }

    /// 发送请求，忽略响应体
    pub(crate) async fn execute<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<T>,
    ) -> Result<()> {
        self.send(method, path, query, body).await?;
        Ok(())
    }

    async fn send<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<T>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("端点 API 请求: {} {} {:?}", method, url, query);

        let token = self.session_token.read().await;
        let token_str = token
            .as_ref()
            .ok_or_else(|| OperationError::AuthError("未认证，请先登录".to_string()))?;

        let mut request = self
            .http_client
            .request(method, &url)
            .header(SESSION_HEADER, token_str);

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OperationError::Timeout(e.to_string())
            } else {
                OperationError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误响应".to_string());
            warn!("API 请求失败: {} - {}", status, error_text);
            return Err(match status.as_u16() {
                401 => OperationError::AuthError(error_text),
                404 => OperationError::NotFound(error_text),
                code => OperationError::ApiError(code, error_text),
            });
        }

        Ok(response)
    }

    /// 获取基础 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
