//! # 门诊管理模块
//!
//! 提供配置管理、日志初始化，以及把队列、通知和处方组件装配在一起的工作台入口

pub mod config;
pub mod logging;

use anyhow::Result;
use clinic_core::{ClinicError, ClinicService, EncounterId, NoticeSink};
use clinic_integration::{Connector, DoctorPortalConnector};
use clinic_prescription::{PrescriptionComposer, TemplateCatalog};
use clinic_storage::TemplateRepository;
use clinic_workflow::{NotificationCounter, PeriodicTask, QueueCounts, QueueEngine};
use std::sync::Arc;
use tokio::sync::Mutex;

pub use config::{ClinicConfig, ConfigManager, ConfigValidator};
pub use logging::init_logging;

/// 医生工作台
///
/// 一个医生会话内共享的队列引擎、通知计数与模板目录
pub struct ClinicWorkbench {
    config: ClinicConfig,
    service: Arc<dyn ClinicService>,
    notices: Arc<dyn NoticeSink>,
    queue: Arc<QueueEngine>,
    notifications: Arc<NotificationCounter>,
    catalog: Arc<Mutex<TemplateCatalog>>,
    tasks: Mutex<Vec<PeriodicTask>>,
}

impl std::fmt::Debug for ClinicWorkbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicWorkbench")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl ClinicWorkbench {
    /// 使用配置中的模板目录创建工作台
    pub fn new(
        config: ClinicConfig,
        service: Arc<dyn ClinicService>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        let store = Arc::new(config.templates.open_store());
        Self::with_template_store(config, service, notices, store)
    }

    pub fn with_template_store(
        config: ClinicConfig,
        service: Arc<dyn ClinicService>,
        notices: Arc<dyn NoticeSink>,
        store: Arc<dyn TemplateRepository>,
    ) -> Self {
        let queue = Arc::new(QueueEngine::new(
            service.clone(),
            notices.clone(),
            config.queue.clinician_id,
            config.queue.advance_policy,
        ));
        let notifications = Arc::new(NotificationCounter::new(service.clone()));
        let catalog = Arc::new(Mutex::new(TemplateCatalog::open(store, notices.clone())));

        Self {
            config,
            service,
            notices,
            queue,
            notifications,
            catalog,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// 连接医生门户并创建工作台
    pub async fn connect(config: ClinicConfig, notices: Arc<dyn NoticeSink>) -> Result<Self> {
        let mut connector = DoctorPortalConnector::new("doctor-portal".to_string());
        connector.initialize(config.service.connector_config()).await?;
        tracing::info!("Connected to doctor portal at {}", config.service.base_url);

        Ok(Self::new(config, Arc::new(connector), notices))
    }

    /// 启动队列与通知的周期刷新，首次刷新立即执行
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            tracing::debug!("Workbench refresh already running");
            return;
        }

        tasks.push(self.queue.start_auto_refresh(self.config.queue.refresh_interval()));
        tasks.push(
            self.notifications
                .start_auto_refresh(self.config.notifications.refresh_interval()),
        );
        tracing::info!("Workbench started for clinician {}", self.config.queue.clinician_id);
    }

    /// 停止周期刷新并等待进行中的刷新结束
    pub async fn stop(&self) {
        let tasks: Vec<PeriodicTask> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            task.shutdown().await;
        }
        tracing::info!("Workbench stopped");
    }

    pub async fn is_running(&self) -> bool {
        !self.tasks.lock().await.is_empty()
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<QueueEngine> {
        &self.queue
    }

    pub fn notifications(&self) -> &Arc<NotificationCounter> {
        &self.notifications
    }

    pub fn catalog(&self) -> &Arc<Mutex<TemplateCatalog>> {
        &self.catalog
    }

    /// 为队列中的就诊开启开方会话
    pub async fn open_composer(
        &self,
        encounter_id: EncounterId,
    ) -> clinic_core::Result<PrescriptionComposer> {
        let encounter = self
            .queue
            .encounter(encounter_id)
            .await
            .ok_or_else(|| ClinicError::NotFound(format!("Encounter {} not in queue", encounter_id)))?;
        PrescriptionComposer::for_encounter(self.service.clone(), self.notices.clone(), &encounter)
    }

    /// 开启未绑定患者的开方会话
    pub fn new_composer(&self) -> PrescriptionComposer {
        PrescriptionComposer::new(self.service.clone(), self.notices.clone())
    }

    /// 生成工作台状态报告
    pub async fn status_report(&self) -> WorkbenchStatus {
        WorkbenchStatus {
            timestamp: chrono::Utc::now(),
            queue: self.queue.counts().await,
            unread_notifications: self.notifications.unread_count().await,
            templates: self.catalog.lock().await.len(),
            refreshing: self.is_running().await,
        }
    }
}

/// 工作台状态报告
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkbenchStatus {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub queue: QueueCounts,
    pub unread_notifications: u64,
    pub templates: usize,
    pub refreshing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::{Encounter, EncounterStatus, NoticeLog, NotificationRecord, PatientSnapshot};
    use clinic_integration::InMemoryClinicService;
    use clinic_storage::InMemoryTemplateStore;
    use std::time::Duration;

    fn encounter(id: i64, status: EncounterStatus) -> Encounter {
        Encounter {
            id,
            patient: PatientSnapshot {
                patient_id: id + 100,
                first_name: Some("Ram".to_string()),
                last_name: Some("Bista".to_string()),
                ..Default::default()
            },
            scheduled_at: chrono::NaiveDate::from_ymd_opt(2026, 10, 16)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .unwrap(),
            visit_type: Some("New".to_string()),
            status,
            reason: None,
        }
    }

    fn workbench() -> ClinicWorkbench {
        let service = Arc::new(
            InMemoryClinicService::new()
                .with_encounters(vec![
                    encounter(1, EncounterStatus::InConsultation),
                    encounter(2, EncounterStatus::Booked),
                ])
                .with_notifications(vec![NotificationRecord {
                    notification_id: 1,
                    kind: None,
                    title: Some("Lab result ready".to_string()),
                    message: None,
                    is_read: false,
                    priority: None,
                    created_on: None,
                }]),
        );
        ClinicWorkbench::with_template_store(
            ClinicConfig::default(),
            service,
            Arc::new(NoticeLog::new()),
            Arc::new(InMemoryTemplateStore::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refreshes_and_stop_halts() {
        let workbench = workbench();
        workbench.start().await;
        workbench.start().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let report = workbench.status_report().await;
        assert_eq!(report.queue.total, 2);
        assert_eq!(report.unread_notifications, 1);
        assert_eq!(report.templates, 7);
        assert!(report.refreshing);

        workbench.stop().await;
        assert!(!workbench.is_running().await);
    }

    #[tokio::test]
    async fn test_open_composer_requires_prescribable_encounter() {
        let workbench = workbench();
        workbench.queue().refresh().await.unwrap();

        let composer = workbench.open_composer(1).await.unwrap();
        assert_eq!(composer.draft().patient.as_ref().unwrap().patient_id, 101);
        assert!(workbench.open_composer(2).await.is_err());
        assert!(matches!(
            workbench.open_composer(9).await,
            Err(ClinicError::NotFound(_))
        ));
    }
}
