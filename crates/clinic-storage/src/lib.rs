//! # 门诊存储模块
//!
//! 负责处方模板集合的本地持久化。模板集合总是整体读取、整体写入。

pub mod template_store;

pub use template_store::*;
