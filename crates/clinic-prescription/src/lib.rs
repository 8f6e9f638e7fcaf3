//! # 处方模块
//!
//! 负责处方草稿的编写与处方模板管理：
//! - 草稿：模板合并与撤销、药品编辑、提交前校验
//! - 模板目录：内置模板与用户模板的持久化
//! - 开方会话：患者检索、提交与结果提示

pub mod builtin;
pub mod catalog;
pub mod composer;
pub mod draft;
pub mod suggestions;

pub use builtin::builtin_templates;
pub use catalog::{validate_template, TemplateCatalog};
pub use composer::{PrescriptionComposer, MIN_PATIENT_QUERY_CHARS};
pub use draft::{MedicineField, PatientBinding, PrescriptionDraft, TemplateToggle};
pub use suggestions::{suggest_medicines, MEDICINE_NAMES};
