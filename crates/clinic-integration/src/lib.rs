//! # 门诊集成模块
//!
//! 提供外部门诊数据服务的接入实现：
//! - 医生门户 REST 连接器，基于 reqwest
//! - 内存版服务，可注入失败与延迟，供演示和测试使用

pub mod connectors;
pub mod memory;

pub use connectors::{
    AuthenticationConfig, Connector, ConnectorConfig, ConnectorStatus, DoctorPortalConnector,
};
pub use memory::{InMemoryClinicService, Operation};
