//! 外部系统连接器模块
//!
//! 通过医生门户的 REST 接口实现 [`ClinicService`]。门户的所有响应都包在
//! `{ Status, Results, ErrorMessage }` 信封中。

use anyhow::{Context, Result};
use async_trait::async_trait;
use clinic_core::{
    ClinicError, ClinicService, Encounter, EncounterId, EncounterStatus, NotificationId,
    NotificationRecord, PatientSummary, PrescriptionPayload,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 连接器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub name: String,
    pub endpoint: String,
    pub authentication: AuthenticationConfig,
    pub request_timeout_secs: u64,
    pub enabled: bool,
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthenticationConfig {
    None,
    BearerToken { token: String },
}

/// 连接器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorStatus {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

/// 连接器接口
#[async_trait]
pub trait Connector: Send + Sync {
    /// 获取连接器名称
    fn name(&self) -> &str;

    /// 初始化连接器
    async fn initialize(&mut self, config: ConnectorConfig) -> Result<()>;

    /// 检查连接状态
    async fn check_connection(&self) -> Result<bool>;

    /// 获取连接状态
    fn status(&self) -> ConnectorStatus;

    /// 关闭连接器
    async fn shutdown(&mut self) -> Result<()>;
}

/// 门户响应信封
#[derive(Debug, Deserialize)]
struct PortalEnvelope<T> {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Results")]
    results: Option<T>,
    #[serde(rename = "ErrorMessage")]
    error_message: Option<String>,
}

impl<T> PortalEnvelope<T> {
    fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("OK")
    }

    fn into_results(self) -> Result<T> {
        if !self.is_ok() {
            return Err(anyhow::anyhow!(
                "Portal rejected request: {}",
                self.error_message.as_deref().unwrap_or("no error message")
            ));
        }
        self.results
            .ok_or_else(|| anyhow::anyhow!("Portal response carried no Results"))
    }

    fn into_ack(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Portal rejected request: {}",
                self.error_message.as_deref().unwrap_or("no error message")
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnreadCount {
    unread: u64,
}

/// 医生门户连接器
pub struct DoctorPortalConnector {
    name: String,
    status: ConnectorStatus,
    config: Option<ConnectorConfig>,
    client: Option<reqwest::Client>,
}

impl DoctorPortalConnector {
    pub fn new(name: String) -> Self {
        Self {
            name,
            status: ConnectorStatus::Disconnected,
            config: None,
            client: None,
        }
    }

    fn session(&self) -> Result<(&reqwest::Client, &ConnectorConfig)> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Connector not initialized"))?;
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Connector not configured"))?;
        Ok((client, config))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let (client, config) = self.session()?;
        let url = format!("{}{}", config.endpoint, path);
        let request = Self::add_auth_headers(client.get(&url).query(query), &config.authentication)?;

        let response = request.send().await.with_context(|| format!("GET {}", url))?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("GET {} failed: {}", url, response.status()));
        }
        let envelope: PortalEnvelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode response of GET {}", url))?;
        envelope.into_results()
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<()> {
        let (client, config) = self.session()?;
        let url = format!("{}{}", config.endpoint, path);
        let mut request = client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = Self::add_auth_headers(request, &config.authentication)?;

        let response = request
            .send()
            .await
            .with_context(|| format!("{} {}", method, url))?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("{} {} failed: {}", method, url, response.status()));
        }
        let envelope: PortalEnvelope<serde_json::Value> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode response of {} {}", method, url))?;
        envelope.into_ack()
    }

    /// 添加认证头
    fn add_auth_headers(
        request: reqwest::RequestBuilder,
        auth: &AuthenticationConfig,
    ) -> Result<reqwest::RequestBuilder> {
        match auth {
            AuthenticationConfig::None => Ok(request),
            AuthenticationConfig::BearerToken { token } => Ok(request.bearer_auth(token)),
        }
    }
}

fn service_error(err: anyhow::Error) -> ClinicError {
    ClinicError::Service(format!("{:#}", err))
}

#[async_trait]
impl Connector for DoctorPortalConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self, config: ConnectorConfig) -> Result<()> {
        info!("Initializing doctor portal connector: {}", self.name);

        if !config.enabled {
            self.status = ConnectorStatus::Disconnected;
            return Err(anyhow::anyhow!("Connector {} is disabled", self.name));
        }

        self.status = ConnectorStatus::Connecting;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        self.config = Some(config);
        self.client = Some(client);

        match self.check_connection().await {
            Ok(true) => {
                self.status = ConnectorStatus::Connected;
                info!("Doctor portal connector {} connected successfully", self.name);
                Ok(())
            }
            Ok(false) => {
                // 门户暂时不可达时保留客户端，后续请求各自报告失败
                self.status = ConnectorStatus::Error("Connection test failed".to_string());
                warn!("Doctor portal {} not reachable yet", self.name);
                Ok(())
            }
            Err(e) => {
                self.status = ConnectorStatus::Error(e.to_string());
                Err(e)
            }
        }
    }

    async fn check_connection(&self) -> Result<bool> {
        let (client, config) = match self.session() {
            Ok(session) => session,
            Err(_) => return Ok(false),
        };
        let health_url = format!("{}/api/Health", config.endpoint);
        let request = Self::add_auth_headers(client.get(&health_url), &config.authentication)?;

        match request.send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                warn!("Health check failed for {}: {}", self.name, e);
                Ok(false)
            }
        }
    }

    fn status(&self) -> ConnectorStatus {
        self.status.clone()
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down doctor portal connector: {}", self.name);
        self.client = None;
        self.status = ConnectorStatus::Disconnected;
        Ok(())
    }
}

#[async_trait]
impl ClinicService for DoctorPortalConnector {
    async fn list_encounters_for_today(&self, clinician_id: i64) -> clinic_core::Result<Vec<Encounter>> {
        // 门户根据令牌识别医生身份
        debug!("Fetching today's queue for clinician {}", clinician_id);
        self.get("/api/DoctorPortal/Queue", &[]).await.map_err(service_error)
    }

    async fn transition_encounter(
        &self,
        encounter_id: EncounterId,
        target: EncounterStatus,
    ) -> clinic_core::Result<()> {
        let path = format!("/api/DoctorPortal/Queue/{}/Status", encounter_id);
        let body = serde_json::json!({ "status": target.as_str() });
        self.send_json(reqwest::Method::PUT, &path, Some(&body))
            .await
            .map_err(service_error)
    }

    async fn search_patients(&self, query: &str) -> clinic_core::Result<Vec<PatientSummary>> {
        self.get("/api/DoctorPortal/SearchPatient", &[("query", query)])
            .await
            .map_err(service_error)
    }

    async fn create_prescription(&self, payload: &PrescriptionPayload) -> clinic_core::Result<()> {
        self.send_json(reqwest::Method::POST, "/api/DoctorPortal/Prescriptions", Some(payload))
            .await
            .map_err(service_error)
    }

    async fn unread_notification_count(&self) -> clinic_core::Result<u64> {
        let count: UnreadCount = self
            .get("/api/Notifications/UnreadCount", &[])
            .await
            .map_err(service_error)?;
        Ok(count.unread)
    }

    async fn list_notifications(&self) -> clinic_core::Result<Vec<NotificationRecord>> {
        self.get("/api/Notifications", &[]).await.map_err(service_error)
    }

    async fn mark_notification_read(&self, id: NotificationId) -> clinic_core::Result<()> {
        let path = format!("/api/Notifications/{}/Read", id);
        self.send_json::<()>(reqwest::Method::PUT, &path, None)
            .await
            .map_err(service_error)
    }

    async fn mark_all_notifications_read(&self) -> clinic_core::Result<()> {
        self.send_json::<()>(reqwest::Method::PUT, "/api/Notifications/ReadAll", None)
            .await
            .map_err(service_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_results() {
        let ok: PortalEnvelope<UnreadCount> =
            serde_json::from_str(r#"{"Status":"OK","Results":{"unread":4}}"#).unwrap();
        assert_eq!(ok.into_results().unwrap().unread, 4);

        let failed: PortalEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"Status":"Failed","ErrorMessage":"Notification not found"}"#)
                .unwrap();
        let err = failed.into_ack().unwrap_err();
        assert!(err.to_string().contains("Notification not found"));
    }

    #[test]
    fn test_envelope_without_results() {
        let empty: PortalEnvelope<Vec<Encounter>> =
            serde_json::from_str(r#"{"Status":"OK","Results":null}"#).unwrap();
        assert!(empty.into_results().is_err());
    }

    #[test]
    fn test_auth_headers() {
        let client = reqwest::Client::new();
        let bearer = DoctorPortalConnector::add_auth_headers(
            client.get("http://localhost/health"),
            &AuthenticationConfig::BearerToken {
                token: "abc".to_string(),
            },
        )
        .unwrap()
        .build()
        .unwrap();
        assert_eq!(bearer.headers()[reqwest::header::AUTHORIZATION], "Bearer abc");

        let anonymous = DoctorPortalConnector::add_auth_headers(
            client.get("http://localhost/health"),
            &AuthenticationConfig::None,
        )
        .unwrap()
        .build()
        .unwrap();
        assert!(anonymous.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_uninitialized_connector_reports_service_error() {
        let connector = DoctorPortalConnector::new("portal".to_string());
        assert_eq!(connector.status(), ConnectorStatus::Disconnected);

        let result = connector.list_encounters_for_today(1).await;
        assert!(matches!(result, Err(ClinicError::Service(_))));
    }
}
