//! 就诊队列引擎
//!
//! 协调就诊存储、状态机与外部服务：拉取当天队列、生成队列视图、执行状态前进。

use crate::{
    queue::{order_queue, QueueCounts, QueueFilter},
    refresh::PeriodicTask,
    state_machine::{EncounterEvent, EncounterStateMachine},
    store::EncounterStore,
};
use clinic_core::{
    ClinicError, ClinicService, Encounter, EncounterId, EncounterStatus, Notice, NoticeSink,
    Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// 同一就诊重复发起前进请求时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvancePolicy {
    /// 允许重入，在途标记只用于忙碌提示
    AllowReentry,
    /// 同一就诊在途期间拒绝再次前进
    SingleFlight,
}

impl Default for AdvancePolicy {
    fn default() -> Self {
        AdvancePolicy::AllowReentry
    }
}

/// 在途请求登记，离开作用域时自动注销
struct InFlightGuard<'a> {
    registry: &'a Mutex<HashMap<EncounterId, usize>>,
    id: EncounterId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = registry.get_mut(&self.id) {
            *count -= 1;
            if *count == 0 {
                registry.remove(&self.id);
            }
        }
    }
}

/// 就诊队列引擎
pub struct QueueEngine {
    service: Arc<dyn ClinicService>,
    notices: Arc<dyn NoticeSink>,
    state_machine: EncounterStateMachine,
    clinician_id: i64,
    policy: AdvancePolicy,
    store: RwLock<EncounterStore>,
    in_flight: Mutex<HashMap<EncounterId, usize>>,
}

impl std::fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("clinician_id", &self.clinician_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl QueueEngine {
    /// 创建新的队列引擎
    pub fn new(
        service: Arc<dyn ClinicService>,
        notices: Arc<dyn NoticeSink>,
        clinician_id: i64,
        policy: AdvancePolicy,
    ) -> Self {
        Self {
            service,
            notices,
            state_machine: EncounterStateMachine::new(),
            clinician_id,
            policy,
            store: RwLock::new(EncounterStore::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// 拉取当天队列
    ///
    /// 失败时保留上一次的队列，不清空视图。
    pub async fn refresh(&self) -> Result<usize> {
        match self.service.list_encounters_for_today(self.clinician_id).await {
            Ok(encounters) => {
                let count = encounters.len();
                self.store.write().await.replace(encounters);
                tracing::debug!("Queue refreshed with {} encounters", count);
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Failed to load queue, keeping previous view: {}", e);
                self.notices.publish(Notice::error("Failed to load queue"));
                Err(e)
            }
        }
    }

    /// 生成队列视图
    pub async fn view(&self, filter: QueueFilter, search: &str) -> Vec<Encounter> {
        let store = self.store.read().await;
        order_queue(store.encounters(), filter, search)
    }

    /// 队列统计（基于完整队列，不受过滤影响）
    pub async fn counts(&self) -> QueueCounts {
        QueueCounts::from_encounters(self.store.read().await.encounters())
    }

    pub async fn encounter(&self, id: EncounterId) -> Option<Encounter> {
        self.store.read().await.get(id).cloned()
    }

    /// 该就诊当前可执行的下一步操作
    pub async fn next_action(&self, id: EncounterId) -> Option<EncounterEvent> {
        let store = self.store.read().await;
        let encounter = store.get(id)?;
        self.state_machine.next_step(&encounter.status).map(|(event, _)| event)
    }

    /// 该就诊是否有状态请求在途
    pub fn is_busy(&self, id: EncounterId) -> bool {
        self.lock_in_flight().contains_key(&id)
    }

    /// 将就诊推进到下一状态
    ///
    /// 外部服务确认后才更新本地状态；失败时本地状态不变，不自动重试。
    pub async fn advance(&self, id: EncounterId) -> Result<EncounterStatus> {
        let encounter = match self.encounter(id).await {
            Some(encounter) => encounter,
            None => {
                self.notices.publish(Notice::error("Failed to update status"));
                return Err(ClinicError::NotFound(format!("Encounter {} not in queue", id)));
            }
        };
        let patient_name = encounter.patient_name();

        let target = match self.state_machine.advance_target(&encounter.status) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Encounter {} has no valid transition from {}", id, encounter.status);
                self.notices
                    .publish(Notice::error(format!("No valid transition for {}", patient_name)));
                return Err(e);
            }
        };

        let _guard = match self.register_in_flight(id) {
            Ok(guard) => guard,
            Err(e) => {
                self.notices.publish(Notice::error(format!(
                    "Status update for {} is already in progress",
                    patient_name
                )));
                return Err(e);
            }
        };

        tracing::info!("Advancing encounter {} from {} to {}", id, encounter.status, target);
        match self.service.transition_encounter(id, target.clone()).await {
            Ok(()) => {
                if !self.store.write().await.set_status(id, target.clone()) {
                    tracing::debug!("Encounter {} left the queue before confirmation", id);
                }
                self.notices
                    .publish(Notice::success(format!("{} → {}", patient_name, target.label())));
                Ok(target)
            }
            Err(e) => {
                tracing::warn!("Failed to update status of encounter {}: {}", id, e);
                self.notices.publish(Notice::error("Failed to update status"));
                Err(e)
            }
        }
    }

    /// 启动队列的周期刷新
    pub fn start_auto_refresh(self: &Arc<Self>, period: Duration) -> PeriodicTask {
        let engine = Arc::clone(self);
        PeriodicTask::spawn("queue-refresh", period, move || {
            let engine = Arc::clone(&engine);
            async move {
                // 失败已在 refresh 内记录并提示
                let _ = engine.refresh().await;
            }
        })
    }

    pub fn policy(&self) -> AdvancePolicy {
        self.policy
    }

    fn register_in_flight(&self, id: EncounterId) -> Result<InFlightGuard<'_>> {
        let mut registry = self.lock_in_flight();
        let count = registry.entry(id).or_insert(0);
        if *count > 0 && self.policy == AdvancePolicy::SingleFlight {
            return Err(ClinicError::TransitionInFlight(id));
        }
        *count += 1;
        Ok(InFlightGuard {
            registry: &self.in_flight,
            id,
        })
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<EncounterId, usize>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
