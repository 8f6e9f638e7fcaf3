//! # Clinic Core
//!
//! 门诊工作台的核心模块，提供基础数据结构、错误定义、外部服务接口和通用工具。

pub mod error;
pub mod models;
pub mod notice;
pub mod service;
pub mod utils;
pub mod vocabulary;

pub use error::{ClinicError, Result};
pub use models::*;
pub use notice::{Notice, NoticeKind, NoticeLog, NoticeSink, TracingNoticeSink};
pub use service::ClinicService;
pub use vocabulary::{CourseDuration, FoodTiming, Frequency};
