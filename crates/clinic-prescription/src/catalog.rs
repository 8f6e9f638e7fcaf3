//! 处方模板目录
//!
//! 每次变更都把整个模板集合写回仓库；写入成功后才更新内存中的目录。

use crate::builtin::builtin_templates;
use crate::draft::PrescriptionDraft;
use clinic_core::utils::generate_template_id;
use clinic_core::{ClinicError, MedicineEntry, Notice, NoticeSink, Result, Template};
use clinic_storage::TemplateRepository;
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_TEMPLATE_NAME: &str = "My Template";

/// 模板目录
pub struct TemplateCatalog {
    repository: Arc<dyn TemplateRepository>,
    notices: Arc<dyn NoticeSink>,
    templates: Vec<Template>,
}

impl std::fmt::Debug for TemplateCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCatalog")
            .field("templates", &self.templates.len())
            .finish_non_exhaustive()
    }
}

impl TemplateCatalog {
    /// 打开模板目录
    ///
    /// 仓库中没有数据或数据无法读取时写入内置模板。
    pub fn open(repository: Arc<dyn TemplateRepository>, notices: Arc<dyn NoticeSink>) -> Self {
        let templates = match repository.load() {
            Ok(Some(templates)) => {
                tracing::info!("Loaded {} prescription templates", templates.len());
                return Self {
                    repository,
                    notices,
                    templates,
                };
            }
            Ok(None) => {
                tracing::info!("No saved templates, seeding built-in templates");
                builtin_templates()
            }
            Err(e) => {
                tracing::warn!("Saved templates unreadable, seeding built-in templates: {}", e);
                builtin_templates()
            }
        };

        if let Err(e) = repository.store(&templates) {
            tracing::warn!("Failed to persist built-in templates: {}", e);
        }

        Self {
            repository,
            notices,
            templates,
        }
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 新建模板
    pub fn create_template(
        &mut self,
        name: &str,
        medicines: Vec<MedicineEntry>,
    ) -> Result<Template> {
        let template = Template {
            id: generate_template_id(),
            name: name.trim().to_string(),
            medicines,
        };
        self.notify_failure(validate_template(&template))?;

        let mut next = self.templates.clone();
        next.push(template.clone());
        self.persist(next)?;

        tracing::info!("Template {} created", template.id);
        self.notices
            .publish(Notice::success(format!("Template \"{}\" saved", template.name)));
        Ok(template)
    }

    /// 按标识整体替换模板
    pub fn update_template(&mut self, template: Template) -> Result<()> {
        let template = Template {
            name: template.name.trim().to_string(),
            ..template
        };
        self.notify_failure(validate_template(&template))?;

        let position = self
            .templates
            .iter()
            .position(|t| t.id == template.id)
            .ok_or_else(|| ClinicError::NotFound(format!("Template {}", template.id)));
        let position = self.notify_failure(position)?;

        let mut next = self.templates.clone();
        next[position] = template.clone();
        self.persist(next)?;

        tracing::info!("Template {} updated", template.id);
        self.notices
            .publish(Notice::success(format!("Template \"{}\" saved", template.name)));
        Ok(())
    }

    /// 删除模板，已应用该模板的草稿不受影响
    pub fn delete_template(&mut self, id: &str) -> Result<Template> {
        let position = self
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ClinicError::NotFound(format!("Template {}", id)));
        let position = self.notify_failure(position)?;

        let mut next = self.templates.clone();
        let removed = next.remove(position);
        self.persist(next)?;

        tracing::info!("Template {} deleted", id);
        self.notices.publish(Notice::success("Template deleted"));
        Ok(removed)
    }

    /// 把草稿中的药品另存为新模板
    ///
    /// 未给名称时依次使用诊断和默认名称；同名药品只保留第一条。
    pub fn save_draft_as_template(
        &mut self,
        name: Option<&str>,
        draft: &PrescriptionDraft,
    ) -> Result<Template> {
        if draft.medicines().is_empty() {
            return self.notify_failure(Err(ClinicError::Validation(
                "Add medicines first before saving as template".to_string(),
            )));
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| Some(draft.diagnosis.trim()).filter(|d| !d.is_empty()))
            .unwrap_or(DEFAULT_TEMPLATE_NAME)
            .to_string();

        let mut seen = HashSet::new();
        let medicines: Vec<MedicineEntry> = draft
            .medicines()
            .iter()
            .filter(|m| seen.insert(m.name.clone()))
            .cloned()
            .collect();

        let template = Template {
            id: generate_template_id(),
            name,
            medicines,
        };
        self.notify_failure(validate_template(&template))?;

        let mut next = self.templates.clone();
        next.push(template.clone());
        self.persist(next)?;

        tracing::info!("Draft saved as template {}", template.id);
        self.notices
            .publish(Notice::success(format!("Template \"{}\" created", template.name)));
        Ok(template)
    }

    fn persist(&mut self, next: Vec<Template>) -> Result<()> {
        match self.repository.store(&next) {
            Ok(()) => {
                self.templates = next;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to persist templates: {}", e);
                self.notices.publish(Notice::error("Failed to save templates"));
                Err(e)
            }
        }
    }

    fn notify_failure<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let message = match e {
                ClinicError::Validation(message) => message.clone(),
                other => other.to_string(),
            };
            self.notices.publish(Notice::error(message));
        }
        result
    }
}

/// 模板名称必填，模板内药品名称不能重复
pub fn validate_template(template: &Template) -> Result<()> {
    if template.name.trim().is_empty() {
        return Err(ClinicError::Validation("Template name is required".to_string()));
    }

    let mut seen = HashSet::new();
    for medicine in &template.medicines {
        if medicine.name.trim().is_empty() {
            return Err(ClinicError::Validation(format!(
                "Template \"{}\" has a medicine without a name",
                template.name
            )));
        }
        if !seen.insert(medicine.name.as_str()) {
            return Err(ClinicError::Validation(format!(
                "Medicine \"{}\" appears more than once in template \"{}\"",
                medicine.name, template.name
            )));
        }
    }
    Ok(())
}
