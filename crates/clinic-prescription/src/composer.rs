//! 开方会话
//!
//! 一次会话对应一个草稿：检索并绑定患者、合并模板、编辑药品，最后提交给外部服务。

use crate::draft::{MedicineField, PatientBinding, PrescriptionDraft, TemplateToggle};
use clinic_core::{
    ClinicError, ClinicService, Encounter, MedicineEntry, Notice, NoticeSink, PatientId,
    PatientSummary, PrescriptionStatus, Result, Template,
};
use std::sync::Arc;

/// 患者检索的最少有效字符数
pub const MIN_PATIENT_QUERY_CHARS: usize = 2;

/// 开方会话
pub struct PrescriptionComposer {
    service: Arc<dyn ClinicService>,
    notices: Arc<dyn NoticeSink>,
    draft: PrescriptionDraft,
    search_results: Vec<PatientSummary>,
}

impl std::fmt::Debug for PrescriptionComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrescriptionComposer")
            .field("draft", &self.draft)
            .field("search_results", &self.search_results.len())
            .finish_non_exhaustive()
    }
}

impl PrescriptionComposer {
    pub fn new(service: Arc<dyn ClinicService>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            service,
            notices,
            draft: PrescriptionDraft::new(),
            search_results: Vec::new(),
        }
    }

    /// 从队列中的就诊开始开方
    pub fn for_encounter(
        service: Arc<dyn ClinicService>,
        notices: Arc<dyn NoticeSink>,
        encounter: &Encounter,
    ) -> Result<Self> {
        let binding = PatientBinding::from_encounter(encounter)?;
        tracing::info!(
            "Prescription session opened for encounter {} (patient {})",
            encounter.id,
            binding.patient_id
        );

        Ok(Self {
            service,
            notices,
            draft: PrescriptionDraft::for_patient(binding),
            search_results: Vec::new(),
        })
    }

    pub fn draft(&self) -> &PrescriptionDraft {
        &self.draft
    }

    /// 直接编辑诊断、备注、随访等自由字段
    pub fn draft_mut(&mut self) -> &mut PrescriptionDraft {
        &mut self.draft
    }

    pub fn search_results(&self) -> &[PatientSummary] {
        &self.search_results
    }

    /// 检索患者；有效字符不足时清空结果且不访问外部服务
    pub async fn search_patients(&mut self, query: &str) -> Result<&[PatientSummary]> {
        let query = query.trim();
        if query.chars().count() < MIN_PATIENT_QUERY_CHARS {
            self.search_results.clear();
            return Ok(&self.search_results);
        }

        match self.service.search_patients(query).await {
            Ok(results) => {
                tracing::debug!("Patient search '{}' returned {} results", query, results.len());
                self.search_results = results;
                Ok(&self.search_results)
            }
            Err(e) => {
                tracing::warn!("Patient search failed: {}", e);
                Err(e)
            }
        }
    }

    /// 从检索结果中选定患者
    pub fn select_patient(&mut self, patient_id: PatientId) -> Result<&PatientBinding> {
        let patient = self
            .search_results
            .iter()
            .find(|p| p.patient_id == patient_id)
            .ok_or_else(|| {
                ClinicError::NotFound(format!("Patient {} not in search results", patient_id))
            })?;

        let binding = PatientBinding::from_search_result(patient);
        self.search_results.clear();
        Ok(self.draft.patient.insert(binding))
    }

    /// 切换模板：未应用则合并，已应用则撤销
    pub fn toggle_template(&mut self, template: &Template) -> Result<TemplateToggle> {
        let toggle = self.draft.toggle_template(template)?;
        let message = match toggle {
            TemplateToggle::Applied { .. } => format!("Template \"{}\" applied", template.name),
            TemplateToggle::Removed { .. } => format!("Template \"{}\" removed", template.name),
        };
        self.notices.publish(Notice::info(message));
        Ok(toggle)
    }

    pub fn add_medicine(&mut self, entry: MedicineEntry) -> Result<()> {
        self.draft.add_medicine(entry).map_err(|e| self.report(e))
    }

    pub fn update_medicine_field(
        &mut self,
        index: usize,
        field: MedicineField,
        value: &str,
    ) -> Result<()> {
        self.draft
            .update_medicine_field(index, field, value)
            .map_err(|e| self.report(e))
    }

    pub fn remove_medicine(&mut self, index: usize) -> Result<MedicineEntry> {
        self.draft.remove_medicine(index).map_err(|e| self.report(e))
    }

    /// 提交处方
    ///
    /// 成功后清空草稿；失败时草稿保持原样，由医生手动重试。
    pub async fn submit(&mut self, send_to_pharmacy: bool) -> Result<PrescriptionStatus> {
        let payload = self.draft.to_payload(send_to_pharmacy).map_err(|e| self.report(e))?;
        let patient_name = self
            .draft
            .patient
            .as_ref()
            .map(|p| p.display_name.clone())
            .unwrap_or_default();

        match self.service.create_prescription(&payload).await {
            Ok(()) => {
                tracing::info!(
                    "Prescription for patient {} submitted as {:?}",
                    payload.patient_id,
                    payload.status
                );
                let message = if send_to_pharmacy {
                    format!("Prescription sent to pharmacy for {}", patient_name)
                } else {
                    format!("Prescription saved for {}", patient_name)
                };
                self.notices.publish(Notice::success(message));
                self.draft = PrescriptionDraft::new();
                Ok(payload.status)
            }
            Err(e) => {
                tracing::warn!("Failed to save prescription: {}", e);
                self.notices.publish(Notice::error("Failed to save prescription"));
                Err(e)
            }
        }
    }

    /// 放弃当前草稿
    pub fn cancel(&mut self) {
        tracing::debug!("Prescription draft discarded");
        self.draft = PrescriptionDraft::new();
        self.search_results.clear();
    }

    fn report(&self, error: ClinicError) -> ClinicError {
        if let ClinicError::Validation(message) = &error {
            self.notices.publish(Notice::error(message.clone()));
        } else {
            self.notices.publish(Notice::error(error.to_string()));
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::builtin_templates;
    use clinic_core::{
        CourseDuration, EncounterStatus, Frequency, NoticeKind, NoticeLog, PatientSnapshot,
    };
    use clinic_integration::{InMemoryClinicService, Operation};

    fn patient(id: i64, first: &str, last: &str) -> PatientSnapshot {
        PatientSnapshot {
            patient_id: id,
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            patient_code: Some(format!("PT-{}", id)),
            ..Default::default()
        }
    }

    fn encounter(status: EncounterStatus) -> Encounter {
        Encounter {
            id: 77,
            patient: patient(300, "Anil", "Karki"),
            scheduled_at: chrono::NaiveDate::from_ymd_opt(2026, 10, 16)
                .and_then(|d| d.and_hms_opt(10, 30, 0))
                .unwrap(),
            visit_type: Some("Followup".to_string()),
            status,
            reason: None,
        }
    }

    fn session() -> (PrescriptionComposer, Arc<InMemoryClinicService>, Arc<NoticeLog>) {
        let service = Arc::new(InMemoryClinicService::new().with_patients(vec![
            patient(300, "Anil", "Karki"),
            patient(301, "Anita", "Shah"),
        ]));
        let notices = Arc::new(NoticeLog::new());
        let composer = PrescriptionComposer::new(service.clone(), notices.clone());
        (composer, service, notices)
    }

    fn hypertension() -> Template {
        builtin_templates()
            .into_iter()
            .find(|t| t.id == "hypertension")
            .unwrap()
    }

    #[tokio::test]
    async fn test_short_query_does_not_call_service() {
        let (mut composer, service, _) = session();

        assert!(composer.search_patients(" a ").await.unwrap().is_empty());
        assert_eq!(service.call_count(Operation::SearchPatients), 0);

        assert_eq!(composer.search_patients("ani").await.unwrap().len(), 2);
        assert_eq!(service.call_count(Operation::SearchPatients), 1);
    }

    #[tokio::test]
    async fn test_select_patient_binds_draft() {
        let (mut composer, _, _) = session();
        composer.search_patients("shah").await.unwrap();

        let binding = composer.select_patient(301).unwrap();
        assert_eq!(binding.display_name, "Anita Shah");
        assert_eq!(binding.encounter_id, None);
        assert!(composer.search_results().is_empty());
        assert!(composer.select_patient(301).is_err());
    }

    #[tokio::test]
    async fn test_seed_from_encounter() {
        let service = Arc::new(InMemoryClinicService::new());
        let notices = Arc::new(NoticeLog::new());

        let checked_in = encounter(EncounterStatus::CheckedIn);
        assert!(
            PrescriptionComposer::for_encounter(service.clone(), notices.clone(), &checked_in)
                .is_err()
        );

        let consulting = encounter(EncounterStatus::InConsultation);
        let composer =
            PrescriptionComposer::for_encounter(service, notices, &consulting).unwrap();
        let binding = composer.draft().patient.as_ref().unwrap();
        assert_eq!(binding.patient_id, 300);
        assert_eq!(binding.display_name, "Anil Karki");
        assert_eq!(binding.encounter_id, Some(77));
    }

    #[tokio::test]
    async fn test_toggle_template_publishes_notices() {
        let (mut composer, _, notices) = session();
        let template = hypertension();

        composer.toggle_template(&template).unwrap();
        assert_eq!(notices.last().unwrap().message, "Template \"Hypertension\" applied");
        assert_eq!(notices.last().unwrap().kind, NoticeKind::Info);

        composer.toggle_template(&template).unwrap();
        assert_eq!(notices.last().unwrap().message, "Template \"Hypertension\" removed");
        assert!(composer.draft().medicines().is_empty());
    }

    #[tokio::test]
    async fn test_submit_validation_happens_before_network() {
        let (mut composer, service, notices) = session();

        assert!(composer.submit(false).await.is_err());
        assert_eq!(notices.last().unwrap().message, "Please select a patient first");

        composer.search_patients("karki").await.unwrap();
        composer.select_patient(300).unwrap();
        assert!(composer.submit(false).await.is_err());
        assert_eq!(notices.last().unwrap().message, "Add at least one medicine");
        assert_eq!(service.call_count(Operation::CreatePrescription), 0);
    }

    #[tokio::test]
    async fn test_submit_success_clears_draft() {
        let (mut composer, service, notices) = session();
        composer.search_patients("karki").await.unwrap();
        composer.select_patient(300).unwrap();
        composer.toggle_template(&hypertension()).unwrap();
        composer.draft_mut().allergy_warnings = "Penicillin".to_string();

        let status = composer.submit(true).await.unwrap();
        assert_eq!(status, PrescriptionStatus::SentToPharmacy);
        assert_eq!(
            notices.last().unwrap().message,
            "Prescription sent to pharmacy for Anil Karki"
        );

        let sent = service.prescriptions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].diagnosis, "Hypertension");
        assert_eq!(sent[0].allergy_warnings, "Penicillin");
        assert_eq!(composer.draft(), &PrescriptionDraft::new());
    }

    #[tokio::test]
    async fn test_submit_failure_retains_draft() {
        let (mut composer, service, notices) = session();
        composer.search_patients("karki").await.unwrap();
        composer.select_patient(300).unwrap();
        composer
            .add_medicine(MedicineEntry::new(
                "Paracetamol",
                "500mg",
                Frequency::AsNeeded,
                CourseDuration::ThreeDays,
            ))
            .unwrap();
        let before = composer.draft().clone();
        service.fail(Operation::CreatePrescription);

        assert!(composer.submit(false).await.is_err());
        assert_eq!(composer.draft(), &before);
        assert_eq!(notices.last().unwrap().message, "Failed to save prescription");

        service.recover(Operation::CreatePrescription);
        assert_eq!(
            composer.submit(false).await.unwrap(),
            PrescriptionStatus::Finalized
        );
        assert_eq!(notices.last().unwrap().message, "Prescription saved for Anil Karki");
    }

    #[tokio::test]
    async fn test_rejected_medicine_reports_notice() {
        let (mut composer, _, notices) = session();
        let entry = MedicineEntry::new("Ibuprofen", "", Frequency::TwiceDaily, CourseDuration::FiveDays);

        assert!(composer.add_medicine(entry).is_err());
        assert!(composer.draft().medicines().is_empty());
        assert_eq!(
            notices.last().unwrap().message,
            "Medicine name and dosage are required"
        );
    }

    #[tokio::test]
    async fn test_remove_missing_row_reports_notice() {
        let (mut composer, _, notices) = session();
        composer.toggle_template(&hypertension()).unwrap();
        let before = composer.draft().clone();

        assert!(composer.remove_medicine(9).is_err());
        assert_eq!(composer.draft(), &before);
        let notice = notices.last().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, "No medicine at row 9 of 2");
    }

    #[tokio::test]
    async fn test_cancel_discards_everything() {
        let (mut composer, _, _) = session();
        composer.search_patients("anil").await.unwrap();
        composer.toggle_template(&hypertension()).unwrap();

        composer.cancel();
        assert_eq!(composer.draft(), &PrescriptionDraft::new());
        assert!(composer.search_results().is_empty());
    }
}
