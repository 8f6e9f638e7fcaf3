//! 当天就诊存储

use chrono::{DateTime, Utc};
use clinic_core::{Encounter, EncounterId, EncounterStatus};

/// 就诊存储：保存最近一次成功拉取的就诊列表
#[derive(Debug, Default, Clone)]
pub struct EncounterStore {
    encounters: Vec<Encounter>,
    loaded_at: Option<DateTime<Utc>>,
}

impl EncounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用新拉取的列表整体替换
    pub fn replace(&mut self, encounters: Vec<Encounter>) {
        self.encounters = encounters;
        self.loaded_at = Some(Utc::now());
    }

    pub fn get(&self, id: EncounterId) -> Option<&Encounter> {
        self.encounters.iter().find(|e| e.id == id)
    }

    /// 更新本地缓存的状态，返回是否找到该就诊
    pub fn set_status(&mut self, id: EncounterId, status: EncounterStatus) -> bool {
        match self.encounters.iter_mut().find(|e| e.id == id) {
            Some(encounter) => {
                encounter.status = status;
                true
            }
            None => false,
        }
    }

    pub fn encounters(&self) -> &[Encounter] {
        &self.encounters
    }

    /// 最近一次成功拉取的时间；从未成功时为 `None`
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.encounters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encounters.is_empty()
    }
}
