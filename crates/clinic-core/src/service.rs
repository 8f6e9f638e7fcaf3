//! 外部门诊数据服务接口
//!
//! 本工作台只通过此 trait 访问外部服务；每个方法都是一个挂起点。

use crate::error::Result;
use crate::models::{
    Encounter, EncounterId, EncounterStatus, NotificationId, NotificationRecord,
    PatientSummary, PrescriptionPayload,
};
use async_trait::async_trait;

/// 外部服务
#[async_trait]
pub trait ClinicService: Send + Sync {
    /// 获取医生当天的就诊列表
    async fn list_encounters_for_today(&self, clinician_id: i64) -> Result<Vec<Encounter>>;

    /// 请求就诊状态转换
    async fn transition_encounter(
        &self,
        encounter_id: EncounterId,
        target: EncounterStatus,
    ) -> Result<()>;

    /// 检索患者
    async fn search_patients(&self, query: &str) -> Result<Vec<PatientSummary>>;

    /// 提交处方
    async fn create_prescription(&self, payload: &PrescriptionPayload) -> Result<()>;

    /// 未读通知数
    async fn unread_notification_count(&self) -> Result<u64>;

    /// 通知列表
    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>>;

    /// 标记单条通知已读
    async fn mark_notification_read(&self, id: NotificationId) -> Result<()>;

    /// 标记全部通知已读
    async fn mark_all_notifications_read(&self) -> Result<()>;
}
