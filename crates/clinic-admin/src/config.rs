//! 配置管理
//!
//! 配置来源依次为内置默认值、可选的 TOML 文件和 `CLINIC__` 前缀的环境变量，
//! 加载后统一校验。

use anyhow::{Context, Result};
use clinic_integration::{AuthenticationConfig, ConnectorConfig};
use clinic_storage::JsonFileTemplateStore;
use clinic_workflow::AdvancePolicy;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

const ENV_PREFIX: &str = "CLINIC";
const ENV_SEPARATOR: &str = "__";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: Arc<RwLock<ClinicConfig>>,
    /// 配置文件路径；为空时只使用默认值与环境变量
    config_path: Option<String>,
    validator: ConfigValidator,
}

/// 门诊工作台完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicConfig {
    pub service: ServiceConfig,
    pub queue: QueueConfig,
    pub notifications: NotificationConfig,
    pub templates: TemplateConfig,
    pub logging: LoggingConfig,
}

/// 外部服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 门户根地址
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub request_timeout_secs: u64,
}

/// 就诊队列配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub clinician_id: i64,
    pub refresh_interval_secs: u64,
    pub advance_policy: AdvancePolicy,
}

/// 通知配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub refresh_interval_secs: u64,
}

/// 模板存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub store_dir: String,
    /// 模板集合按用户区分
    pub user_key: String,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` 指令，如 `info` 或 `clinic_workflow=debug,info`
    pub level: String,
    pub compact: bool,
    pub show_target: bool,
}

impl ServiceConfig {
    /// 生成门户连接器配置
    pub fn connector_config(&self) -> ConnectorConfig {
        let authentication = match &self.bearer_token {
            Some(token) if !token.trim().is_empty() => AuthenticationConfig::BearerToken {
                token: token.clone(),
            },
            _ => AuthenticationConfig::None,
        };

        ConnectorConfig {
            name: "doctor-portal".to_string(),
            endpoint: self.base_url.trim_end_matches('/').to_string(),
            authentication,
            request_timeout_secs: self.request_timeout_secs,
            enabled: true,
        }
    }
}

impl QueueConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl NotificationConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl TemplateConfig {
    pub fn open_store(&self) -> JsonFileTemplateStore {
        JsonFileTemplateStore::new(&self.store_dir, &self.user_key)
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&ClinicConfig) -> Result<()>,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 加载配置
    pub fn load_config(config_path: Option<&str>) -> Result<ClinicConfig> {
        Self::load_with_env_prefix(config_path, ENV_PREFIX)
    }

    fn load_with_env_prefix(config_path: Option<&str>, env_prefix: &str) -> Result<ClinicConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: ClinicConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!(
            "Configuration loaded from {}",
            config_path.unwrap_or("defaults and environment")
        );
        Ok(config)
    }

    pub async fn get_config(&self) -> ClinicConfig {
        self.config.read().await.clone()
    }

    /// 更新配置，校验通过后写回配置文件
    pub async fn update_config(&self, new_config: ClinicConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        self.save_config().await?;
        info!("Configuration updated successfully");
        Ok(())
    }

    async fn save_config(&self) -> Result<()> {
        let path = match &self.config_path {
            Some(path) => path,
            None => return Ok(()),
        };

        let config = self.config.read().await;
        let config_str =
            toml::to_string_pretty(&*config).context("Failed to serialize configuration")?;

        tokio::fs::write(path, config_str)
            .await
            .with_context(|| format!("Failed to write configuration file {}", path))?;

        info!("Configuration saved to: {}", path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.update_config(new_config).await
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "service.base_url",
                validator: |config| {
                    let url = config.service.base_url.as_str();
                    if url.starts_with("http://") || url.starts_with("https://") {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("Service URL must be http(s): {}", url))
                    }
                },
            },
            ValidationRule {
                field_path: "service.request_timeout_secs",
                validator: |config| {
                    if config.service.request_timeout_secs == 0 {
                        Err(anyhow::anyhow!("Request timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "queue.refresh_interval_secs",
                validator: |config| {
                    if config.queue.refresh_interval_secs == 0 {
                        Err(anyhow::anyhow!("Queue refresh interval cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "notifications.refresh_interval_secs",
                validator: |config| {
                    if config.notifications.refresh_interval_secs == 0 {
                        Err(anyhow::anyhow!("Notification refresh interval cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "templates.user_key",
                validator: |config| {
                    if config.templates.user_key.trim().is_empty() {
                        Err(anyhow::anyhow!("Template user key cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "logging.level",
                validator: |config| {
                    tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                        .map(|_| ())
                        .map_err(|e| anyhow::anyhow!("Invalid log filter: {}", e))
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &ClinicConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("Invalid {}: {}", rule.field_path, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            bearer_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            clinician_id: 0,
            refresh_interval_secs: 30,
            advance_policy: AdvancePolicy::AllowReentry,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            store_dir: "./data/templates".to_string(),
            user_key: "default".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            compact: false,
            show_target: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_config_path() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "clinic-config-{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("clinic.toml")
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ClinicConfig::default();
        assert_eq!(config.queue.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.notifications.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.queue.advance_policy, AdvancePolicy::AllowReentry);
        ConfigValidator::new().validate(&config).unwrap();
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = temp_config_path();
        let config =
            ConfigManager::load_with_env_prefix(path.to_str(), "CLINIC_TEST_MISSING").unwrap();
        assert_eq!(config, ClinicConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = temp_config_path();
        std::fs::write(
            &path,
            "[queue]\nclinician_id = 42\nadvance_policy = \"single-flight\"\n\n[templates]\nuser_key = \"dr-rai\"\n",
        )
        .unwrap();

        let config =
            ConfigManager::load_with_env_prefix(path.to_str(), "CLINIC_TEST_PARTIAL").unwrap();
        assert_eq!(config.queue.clinician_id, 42);
        assert_eq!(config.queue.advance_policy, AdvancePolicy::SingleFlight);
        assert_eq!(config.queue.refresh_interval_secs, 30);
        assert_eq!(config.templates.user_key, "dr-rai");
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = temp_config_path();
        std::fs::write(&path, "[queue]\nclinician_id = 42\n").unwrap();
        std::env::set_var("CLINIC_TEST_ENV__QUEUE__CLINICIAN_ID", "7");
        std::env::set_var("CLINIC_TEST_ENV__SERVICE__BASE_URL", "https://portal.example.org");

        let config = ConfigManager::load_with_env_prefix(path.to_str(), "CLINIC_TEST_ENV").unwrap();
        assert_eq!(config.queue.clinician_id, 7);
        assert_eq!(config.service.base_url, "https://portal.example.org");
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = ClinicConfig::default();
        config.queue.refresh_interval_secs = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = ClinicConfig::default();
        config.service.base_url = "portal.local".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = ClinicConfig::default();
        config.templates.user_key = " ".to_string();
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_connector_config_uses_bearer_token() {
        let mut service = ServiceConfig {
            base_url: "https://portal.example.org/".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            service.connector_config().authentication,
            AuthenticationConfig::None
        ));

        service.bearer_token = Some("abc".to_string());
        let connector = service.connector_config();
        assert_eq!(connector.endpoint, "https://portal.example.org");
        assert!(matches!(
            connector.authentication,
            AuthenticationConfig::BearerToken { ref token } if token == "abc"
        ));
    }

    #[tokio::test]
    async fn test_update_config_round_trips_through_file() {
        let path = temp_config_path();
        let path_str = path.to_str().unwrap().to_string();
        let manager = ConfigManager::new(Some(&path_str)).unwrap();

        let mut config = manager.get_config().await;
        config.queue.clinician_id = 9;
        config.logging.level = "clinic_workflow=debug,info".to_string();
        manager.update_config(config.clone()).await.unwrap();

        let saved: ClinicConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, config);

        let mut invalid = config.clone();
        invalid.notifications.refresh_interval_secs = 0;
        assert!(manager.update_config(invalid).await.is_err());
        assert_eq!(manager.get_config().await, config);
    }
}
