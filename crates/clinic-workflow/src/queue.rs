//! 就诊队列视图
//!
//! 对当天就诊列表做过滤、检索与排序。排序结果每次完整重算，不保留游标。

use clinic_core::utils::contains_ignore_case;
use clinic_core::{Encounter, EncounterStage, EncounterStatus};
use serde::{Deserialize, Serialize};

/// 急诊在排序键上的偏移量，保证任何急诊都排在非急诊之前
pub const EMERGENCY_OFFSET: i32 = -100;

/// 队列过滤器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueFilter {
    /// 未完成且未取消
    Active,
    All,
    Stage(EncounterStage),
}

impl Default for QueueFilter {
    fn default() -> Self {
        QueueFilter::Active
    }
}

impl QueueFilter {
    pub fn matches(&self, status: &EncounterStatus) -> bool {
        match self {
            QueueFilter::All => true,
            QueueFilter::Active => !matches!(
                status.stage(),
                Some(EncounterStage::Completed) | Some(EncounterStage::Cancelled)
            ),
            QueueFilter::Stage(stage) => status.stage() == Some(*stage),
        }
    }
}

/// 队列统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub total: usize,
    /// 已预约与已签到
    pub waiting: usize,
    pub in_consultation: usize,
    pub completed: usize,
}

impl QueueCounts {
    pub fn from_encounters(encounters: &[Encounter]) -> Self {
        let mut counts = QueueCounts {
            total: encounters.len(),
            ..Default::default()
        };

        for encounter in encounters {
            match encounter.status.stage() {
                Some(EncounterStage::Scheduled) | Some(EncounterStage::CheckedIn) => {
                    counts.waiting += 1
                }
                Some(EncounterStage::InConsultation) => counts.in_consultation += 1,
                Some(EncounterStage::Completed) => counts.completed += 1,
                _ => {}
            }
        }

        counts
    }
}

/// 临床阶段优先级，数值越小越靠前
pub fn state_priority(status: &EncounterStatus) -> i32 {
    match status.stage() {
        Some(EncounterStage::InConsultation) => 0,
        Some(EncounterStage::CheckedIn) => 1,
        Some(EncounterStage::Scheduled) => 2,
        Some(EncounterStage::Completed) | None => 3,
        Some(EncounterStage::Cancelled) => 4,
    }
}

/// 排序键：阶段优先级加急诊偏移
pub fn sort_key(encounter: &Encounter) -> i32 {
    let offset = if encounter.is_emergency() { EMERGENCY_OFFSET } else { 0 };
    state_priority(&encounter.status) + offset
}

/// 按姓名、患者编号或患者ID做不区分大小写的子串匹配
pub fn matches_search(encounter: &Encounter, search: &str) -> bool {
    let term = search.trim();
    if term.is_empty() {
        return true;
    }

    let patient = &encounter.patient;
    let name = format!(
        "{} {}",
        patient.first_name.as_deref().unwrap_or(""),
        patient.last_name.as_deref().unwrap_or("")
    );

    contains_ignore_case(&name, term)
        || patient
            .patient_code
            .as_deref()
            .map(|code| contains_ignore_case(code, term))
            .unwrap_or(false)
        || patient.patient_id.to_string().contains(term)
}

/// 生成队列视图：先过滤，再检索，最后按排序键、预约时间升序排列
pub fn order_queue(encounters: &[Encounter], filter: QueueFilter, search: &str) -> Vec<Encounter> {
    let mut items: Vec<&Encounter> = encounters
        .iter()
        .filter(|e| filter.matches(&e.status))
        .filter(|e| matches_search(e, search))
        .collect();

    items.sort_by(|a, b| {
        sort_key(a)
            .cmp(&sort_key(b))
            .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    items.into_iter().cloned().collect()
}
