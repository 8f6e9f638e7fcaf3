//! 处方草稿
//!
//! 一个草稿只属于一次开方会话（一个患者）。模板合并按药品名称匹配，
//! 已应用模板集合只用于保证切换的幂等，不代表药品的真实来源。

use chrono::NaiveDate;
use clinic_core::{
    ClinicError, CourseDuration, Encounter, EncounterId, FoodTiming, Frequency, MedicineEntry,
    PatientId, PatientSummary, PrescriptionPayload, PrescriptionStatus, Result, Template,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 草稿绑定的目标患者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientBinding {
    pub patient_id: PatientId,
    pub display_name: String,
    pub encounter_id: Option<EncounterId>,
}

impl PatientBinding {
    /// 从就诊带入患者，仅接诊中或已完成的就诊可以开方
    pub fn from_encounter(encounter: &Encounter) -> Result<Self> {
        if !encounter.can_prescribe() {
            return Err(ClinicError::Validation(format!(
                "Encounter {} is {} and cannot be prescribed for",
                encounter.id,
                encounter.status.label()
            )));
        }

        Ok(Self {
            patient_id: encounter.patient.patient_id,
            display_name: encounter.patient_name(),
            encounter_id: Some(encounter.id),
        })
    }

    pub fn from_search_result(patient: &PatientSummary) -> Self {
        Self {
            patient_id: patient.patient_id,
            display_name: patient.display_name(),
            encounter_id: None,
        }
    }
}

/// 可单独修改的药品字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicineField {
    Name,
    Dosage,
    Frequency,
    Duration,
    Instructions,
    Timing,
}

/// 模板切换的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateToggle {
    Applied { added: usize },
    Removed { removed: usize },
}

/// 处方草稿
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionDraft {
    pub patient: Option<PatientBinding>,
    pub diagnosis: String,
    /// 主诉与临床备注
    pub clinical_notes: String,
    pub allergy_warnings: String,
    pub patient_weight: Option<f64>,
    pub patient_height: Option<f64>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_notes: String,
    medicines: Vec<MedicineEntry>,
    applied_templates: BTreeSet<String>,
}

impl PrescriptionDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建已绑定患者的空草稿
    pub fn for_patient(patient: PatientBinding) -> Self {
        Self {
            patient: Some(patient),
            ..Default::default()
        }
    }

    pub fn medicines(&self) -> &[MedicineEntry] {
        &self.medicines
    }

    pub fn is_applied(&self, template_id: &str) -> bool {
        self.applied_templates.contains(template_id)
    }

    pub fn applied_templates(&self) -> impl Iterator<Item = &str> {
        self.applied_templates.iter().map(String::as_str)
    }

    /// 合并模板，返回实际新增的药品数
    ///
    /// 名称已存在的药品保持原样；未设置服药时机的默认为饭后。
    pub fn apply_template(&mut self, template: &Template) -> Result<usize> {
        if self.is_applied(&template.id) {
            return Err(ClinicError::TemplateAlreadyApplied(template.name.clone()));
        }

        let mut added = 0;
        for medicine in &template.medicines {
            if self.medicines.iter().any(|m| m.name == medicine.name) {
                continue;
            }
            let mut entry = medicine.clone();
            entry.timing.get_or_insert(FoodTiming::AfterFood);
            self.medicines.push(entry);
            added += 1;
        }

        if self.diagnosis.trim().is_empty() {
            self.diagnosis = template.name.clone();
        } else {
            self.diagnosis = format!("{}, {}", self.diagnosis, template.name);
        }
        self.applied_templates.insert(template.id.clone());

        tracing::debug!("Template {} merged into draft, {} medicines added", template.id, added);
        Ok(added)
    }

    /// 撤销模板，返回移除的药品数
    ///
    /// 按名称移除，同名的手工药品或其他模板带入的药品也会一并移除。
    pub fn remove_template(&mut self, template: &Template) -> Result<usize> {
        if !self.applied_templates.remove(&template.id) {
            return Err(ClinicError::TemplateNotApplied(template.name.clone()));
        }

        let before = self.medicines.len();
        self.medicines.retain(|m| !template.contains_medicine(&m.name));
        self.diagnosis = strip_diagnosis_entry(&self.diagnosis, &template.name);

        let removed = before - self.medicines.len();
        tracing::debug!("Template {} removed from draft, {} medicines dropped", template.id, removed);
        Ok(removed)
    }

    pub fn toggle_template(&mut self, template: &Template) -> Result<TemplateToggle> {
        if self.is_applied(&template.id) {
            self.remove_template(template)
                .map(|removed| TemplateToggle::Removed { removed })
        } else {
            self.apply_template(template)
                .map(|added| TemplateToggle::Applied { added })
        }
    }

    /// 手工添加药品，名称与剂量必填
    pub fn add_medicine(&mut self, entry: MedicineEntry) -> Result<()> {
        if entry.name.trim().is_empty() || entry.dosage.trim().is_empty() {
            return Err(ClinicError::Validation(
                "Medicine name and dosage are required".to_string(),
            ));
        }
        self.medicines.push(entry);
        Ok(())
    }

    /// 修改单个药品字段；枚举类字段按临床文本解析
    pub fn update_medicine_field(
        &mut self,
        index: usize,
        field: MedicineField,
        value: &str,
    ) -> Result<()> {
        let len = self.medicines.len();
        let medicine = self
            .medicines
            .get_mut(index)
            .ok_or_else(|| ClinicError::Validation(format!("No medicine at row {} of {}", index, len)))?;

        match field {
            MedicineField::Name => medicine.name = value.to_string(),
            MedicineField::Dosage => medicine.dosage = value.to_string(),
            MedicineField::Frequency => medicine.frequency = value.parse::<Frequency>()?,
            MedicineField::Duration => medicine.duration = value.parse::<CourseDuration>()?,
            MedicineField::Instructions => medicine.instructions = value.to_string(),
            MedicineField::Timing => {
                medicine.timing = if value.trim().is_empty() {
                    None
                } else {
                    Some(value.parse::<FoodTiming>()?)
                }
            }
        }
        Ok(())
    }

    pub fn remove_medicine(&mut self, index: usize) -> Result<MedicineEntry> {
        if index >= self.medicines.len() {
            return Err(ClinicError::Validation(format!(
                "No medicine at row {} of {}",
                index,
                self.medicines.len()
            )));
        }
        Ok(self.medicines.remove(index))
    }

    /// 校验并生成提交内容
    pub fn to_payload(&self, send_to_pharmacy: bool) -> Result<PrescriptionPayload> {
        let patient = self
            .patient
            .as_ref()
            .ok_or_else(|| ClinicError::Validation("Please select a patient first".to_string()))?;
        if self.medicines.is_empty() {
            return Err(ClinicError::Validation("Add at least one medicine".to_string()));
        }

        Ok(PrescriptionPayload {
            patient_id: patient.patient_id,
            appointment_id: patient.encounter_id,
            diagnosis: self.diagnosis.clone(),
            clinical_notes: self.clinical_notes.clone(),
            allergy_warnings: self.allergy_warnings.clone(),
            medicines: serde_json::to_string(&self.medicines)?,
            status: if send_to_pharmacy {
                PrescriptionStatus::SentToPharmacy
            } else {
                PrescriptionStatus::Finalized
            },
            patient_weight: self.patient_weight,
            patient_height: self.patient_height,
            follow_up_date: self.follow_up_date,
            follow_up_notes: self.follow_up_notes.clone(),
        })
    }
}

/// 从诊断中删去一处模板名称，并整理多余的分隔符
fn strip_diagnosis_entry(diagnosis: &str, name: &str) -> String {
    let remaining = match diagnosis.find(name) {
        Some(pos) if !name.is_empty() => {
            let mut text = diagnosis.to_string();
            text.replace_range(pos..pos + name.len(), "");
            text
        }
        _ => diagnosis.to_string(),
    };

    remaining
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
