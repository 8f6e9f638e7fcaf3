//! 核心数据模型定义
//!
//! 字段命名与外部门诊数据服务的 JSON 保持一致（camelCase）。

use crate::vocabulary::{CourseDuration, FoodTiming, Frequency};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type EncounterId = i64;
pub type PatientId = i64;
pub type NotificationId = i64;

/// 就诊记录上的患者快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub patient_id: PatientId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub patient_code: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
}

/// 患者检索结果与就诊快照结构相同
pub type PatientSummary = PatientSnapshot;

impl PatientSnapshot {
    /// 展示用姓名，缺失时回退为 `Patient #id`
    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let trimmed = full.trim();
        if trimmed.is_empty() {
            format!("Patient #{}", self.patient_id)
        } else {
            trimmed.to_string()
        }
    }
}

/// 就诊（当天的一次预约）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(rename = "appointmentId")]
    pub id: EncounterId,
    #[serde(flatten)]
    pub patient: PatientSnapshot,
    #[serde(rename = "appointmentDate")]
    pub scheduled_at: NaiveDateTime,
    #[serde(rename = "appointmentType", default)]
    pub visit_type: Option<String>,
    #[serde(rename = "appointmentStatus", default)]
    pub status: EncounterStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Encounter {
    /// 就诊类型包含 "emergency"（不区分大小写）即视为急诊
    pub fn is_emergency(&self) -> bool {
        self.visit_type
            .as_deref()
            .map(|t| t.to_lowercase().contains("emergency"))
            .unwrap_or(false)
    }

    /// 接诊中或已完成的就诊可以开具处方
    pub fn can_prescribe(&self) -> bool {
        matches!(
            self.status.stage(),
            Some(EncounterStage::InConsultation) | Some(EncounterStage::Completed)
        )
    }

    pub fn patient_name(&self) -> String {
        self.patient.display_name()
    }
}

/// 临床阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncounterStage {
    Scheduled,
    CheckedIn,
    InConsultation,
    Completed,
    Cancelled,
}

impl EncounterStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EncounterStage::Completed | EncounterStage::Cancelled)
    }

    /// 转换请求中发送给外部服务的状态值
    pub fn wire_status(&self) -> EncounterStatus {
        match self {
            EncounterStage::Scheduled => EncounterStatus::Initiated,
            EncounterStage::CheckedIn => EncounterStatus::CheckedIn,
            EncounterStage::InConsultation => EncounterStatus::InConsultation,
            EncounterStage::Completed => EncounterStatus::Completed,
            EncounterStage::Cancelled => EncounterStatus::Cancelled,
        }
    }
}

/// 外部服务返回的原始就诊状态
///
/// `initiated` 与 `booked` 同属 [`EncounterStage::Scheduled`]；无法识别的值原样保留在
/// `Unknown` 中，只参与排序，不会被本模块改写。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum EncounterStatus {
    Initiated,
    Booked,
    CheckedIn,
    InConsultation,
    Completed,
    Cancelled,
    Unknown(String),
}

impl EncounterStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EncounterStatus::Initiated => "initiated",
            EncounterStatus::Booked => "booked",
            EncounterStatus::CheckedIn => "CheckedIn",
            EncounterStatus::InConsultation => "InConsultation",
            EncounterStatus::Completed => "Completed",
            EncounterStatus::Cancelled => "Cancelled",
            EncounterStatus::Unknown(raw) => raw,
        }
    }

    pub fn stage(&self) -> Option<EncounterStage> {
        match self {
            EncounterStatus::Initiated | EncounterStatus::Booked => Some(EncounterStage::Scheduled),
            EncounterStatus::CheckedIn => Some(EncounterStage::CheckedIn),
            EncounterStatus::InConsultation => Some(EncounterStage::InConsultation),
            EncounterStatus::Completed => Some(EncounterStage::Completed),
            EncounterStatus::Cancelled => Some(EncounterStage::Cancelled),
            EncounterStatus::Unknown(_) => None,
        }
    }

    /// 界面展示标签
    pub fn label(&self) -> &str {
        match self {
            EncounterStatus::Initiated => "Scheduled",
            EncounterStatus::Booked => "Booked",
            EncounterStatus::CheckedIn => "Checked In",
            EncounterStatus::InConsultation => "In Consultation",
            EncounterStatus::Completed => "Completed",
            EncounterStatus::Cancelled => "Cancelled",
            EncounterStatus::Unknown(raw) => raw,
        }
    }
}

impl Default for EncounterStatus {
    fn default() -> Self {
        EncounterStatus::Initiated
    }
}

impl From<&str> for EncounterStatus {
    fn from(raw: &str) -> Self {
        // 门户状态值大小写敏感，按原样比较
        match raw {
            "initiated" => EncounterStatus::Initiated,
            "booked" => EncounterStatus::Booked,
            "CheckedIn" => EncounterStatus::CheckedIn,
            "InConsultation" => EncounterStatus::InConsultation,
            "Completed" => EncounterStatus::Completed,
            "Cancelled" => EncounterStatus::Cancelled,
            _ => EncounterStatus::Unknown(raw.to_string()),
        }
    }
}

impl From<Option<String>> for EncounterStatus {
    fn from(raw: Option<String>) -> Self {
        match raw {
            Some(raw) => EncounterStatus::from(raw.as_str()),
            None => EncounterStatus::default(),
        }
    }
}

impl From<EncounterStatus> for String {
    fn from(status: EncounterStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for EncounterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 药品条目（模板与处方草稿共用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineEntry {
    pub name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub duration: CourseDuration,
    #[serde(default)]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<FoodTiming>,
}

impl MedicineEntry {
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        frequency: Frequency,
        duration: CourseDuration,
    ) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            frequency,
            duration,
            instructions: String::new(),
            timing: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_timing(mut self, timing: FoodTiming) -> Self {
        self.timing = Some(timing);
        self
    }
}

/// 处方模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub medicines: Vec<MedicineEntry>,
}

impl Template {
    pub fn contains_medicine(&self, name: &str) -> bool {
        self.medicines.iter().any(|m| m.name == name)
    }
}

/// 处方提交状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Finalized,
    SentToPharmacy,
}

/// 提交给外部服务的处方内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionPayload {
    pub patient_id: PatientId,
    pub appointment_id: Option<EncounterId>,
    pub diagnosis: String,
    pub clinical_notes: String,
    pub allergy_warnings: String,
    /// 药品列表按顺序序列化后的 JSON 数组文本
    pub medicines: String,
    pub status: PrescriptionStatus,
    pub patient_weight: Option<f64>,
    pub patient_height: Option<f64>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_notes: String,
}

/// 站内通知记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub notification_id: NotificationId,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created_on: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_keeps_unknown_raw() {
        assert_eq!(EncounterStatus::from("booked").stage(), Some(EncounterStage::Scheduled));
        assert_eq!(EncounterStatus::from("initiated"), EncounterStatus::Initiated);
        assert_eq!(EncounterStatus::from("CheckedIn"), EncounterStatus::CheckedIn);

        let odd = EncounterStatus::from("NoShow");
        assert_eq!(odd.stage(), None);
        assert_eq!(odd.as_str(), "NoShow");
    }

    #[test]
    fn test_status_parsing_is_case_sensitive() {
        for raw in ["completed", "cancelled", "Initiated", "checkedin"] {
            let status = EncounterStatus::from(raw);
            assert_eq!(status, EncounterStatus::Unknown(raw.to_string()));
            assert_eq!(status.stage(), None);
            assert_eq!(String::from(status), raw);
        }
    }

    #[test]
    fn test_encounter_wire_shape() {
        let json = r#"{
            "appointmentId": 7,
            "patientId": 42,
            "firstName": "Asha",
            "lastName": "Rai",
            "patientCode": "PT-0042",
            "appointmentDate": "2026-10-16T09:30:00",
            "appointmentType": "Emergency Walk-in",
            "appointmentStatus": null
        }"#;

        let encounter: Encounter = serde_json::from_str(json).unwrap();
        assert_eq!(encounter.id, 7);
        assert_eq!(encounter.status, EncounterStatus::Initiated);
        assert!(encounter.is_emergency());
        assert_eq!(encounter.patient_name(), "Asha Rai");
    }

    #[test]
    fn test_display_name_fallback() {
        let patient = PatientSnapshot {
            patient_id: 9,
            ..Default::default()
        };
        assert_eq!(patient.display_name(), "Patient #9");
    }

    #[test]
    fn test_prescription_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&PrescriptionStatus::SentToPharmacy).unwrap(),
            "\"sent_to_pharmacy\""
        );
        assert_eq!(
            serde_json::to_string(&PrescriptionStatus::Finalized).unwrap(),
            "\"finalized\""
        );
    }
}
