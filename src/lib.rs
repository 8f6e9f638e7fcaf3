//! # 门诊医生工作台
//!
//! 汇总各子模块，供演示程序和上层应用统一引用。

pub use clinic_admin as admin;
pub use clinic_core as core;
pub use clinic_integration as integration;
pub use clinic_prescription as prescription;
pub use clinic_storage as storage;
pub use clinic_workflow as workflow;
