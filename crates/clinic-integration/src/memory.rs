//! 内存版外部服务
//!
//! 用于演示与测试：数据保存在进程内，可按操作注入失败和响应延迟，并记录收到的请求。

use async_trait::async_trait;
use clinic_core::{
    ClinicError, ClinicService, Encounter, EncounterId, EncounterStatus, NotificationId,
    NotificationRecord, PatientSummary, PrescriptionPayload, Result,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// 外部服务操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListEncounters,
    TransitionEncounter,
    SearchPatients,
    CreatePrescription,
    UnreadCount,
    ListNotifications,
    MarkRead,
    MarkAllRead,
}

#[derive(Debug, Default)]
struct MemoryState {
    encounters: Vec<Encounter>,
    patients: Vec<PatientSummary>,
    notifications: Vec<NotificationRecord>,
    prescriptions: Vec<PrescriptionPayload>,
    transitions: Vec<(EncounterId, EncounterStatus)>,
    failing: HashSet<Operation>,
    calls: HashMap<Operation, usize>,
    unread_override: Option<u64>,
}

/// 内存版门诊服务
#[derive(Debug, Default)]
pub struct InMemoryClinicService {
    state: Mutex<MemoryState>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryClinicService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encounters(self, encounters: Vec<Encounter>) -> Self {
        self.lock().encounters = encounters;
        self
    }

    pub fn with_patients(self, patients: Vec<PatientSummary>) -> Self {
        self.lock().patients = patients;
        self
    }

    pub fn with_notifications(self, notifications: Vec<NotificationRecord>) -> Self {
        self.lock().notifications = notifications;
        self
    }

    /// 让指定操作此后都返回服务错误
    pub fn fail(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.lock().failing.remove(&operation);
    }

    /// 每次调用在响应前等待的时长
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// 固定未读数（不再从通知列表推导）
    pub fn set_unread_count(&self, count: Option<u64>) {
        self.lock().unread_override = count;
    }

    pub fn replace_encounters(&self, encounters: Vec<Encounter>) {
        self.lock().encounters = encounters;
    }

    pub fn transitions(&self) -> Vec<(EncounterId, EncounterStatus)> {
        self.lock().transitions.clone()
    }

    pub fn prescriptions(&self) -> Vec<PrescriptionPayload> {
        self.lock().prescriptions.clone()
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.lock().notifications.clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn begin(&self, operation: Operation) -> Result<()> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        debug!("In-memory service call: {:?}", operation);
        if state.failing.contains(&operation) {
            return Err(ClinicError::Service(format!("{:?} unavailable", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ClinicService for InMemoryClinicService {
    async fn list_encounters_for_today(&self, _clinician_id: i64) -> Result<Vec<Encounter>> {
        self.begin(Operation::ListEncounters).await?;
        Ok(self.lock().encounters.clone())
    }

    async fn transition_encounter(
        &self,
        encounter_id: EncounterId,
        target: EncounterStatus,
    ) -> Result<()> {
        self.begin(Operation::TransitionEncounter).await?;
        let mut state = self.lock();
        state.transitions.push((encounter_id, target.clone()));
        let encounter = state
            .encounters
            .iter_mut()
            .find(|e| e.id == encounter_id)
            .ok_or_else(|| ClinicError::NotFound(format!("Appointment {}", encounter_id)))?;
        encounter.status = target;
        Ok(())
    }

    async fn search_patients(&self, query: &str) -> Result<Vec<PatientSummary>> {
        self.begin(Operation::SearchPatients).await?;
        let needle = query.to_lowercase();
        Ok(self
            .lock()
            .patients
            .iter()
            .filter(|p| {
                p.display_name().to_lowercase().contains(&needle)
                    || p.patient_code
                        .as_deref()
                        .map(|c| c.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                    || p.patient_id.to_string().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn create_prescription(&self, payload: &PrescriptionPayload) -> Result<()> {
        self.begin(Operation::CreatePrescription).await?;
        self.lock().prescriptions.push(payload.clone());
        Ok(())
    }

    async fn unread_notification_count(&self) -> Result<u64> {
        self.begin(Operation::UnreadCount).await?;
        let state = self.lock();
        Ok(state
            .unread_override
            .unwrap_or_else(|| state.notifications.iter().filter(|n| !n.is_read).count() as u64))
    }

    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>> {
        self.begin(Operation::ListNotifications).await?;
        Ok(self.lock().notifications.clone())
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        self.begin(Operation::MarkRead).await?;
        let mut state = self.lock();
        let record = state
            .notifications
            .iter_mut()
            .find(|n| n.notification_id == id)
            .ok_or_else(|| ClinicError::NotFound(format!("Notification {}", id)))?;
        record.is_read = true;
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> Result<()> {
        self.begin(Operation::MarkAllRead).await?;
        for record in self.lock().notifications.iter_mut() {
            record.is_read = true;
        }
        Ok(())
    }
}
