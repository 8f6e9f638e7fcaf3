//! 错误定义模块

use thiserror::Error;

/// 门诊系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: {status} 没有可用的下一状态")]
    InvalidStateTransition { status: String },

    #[error("就诊 {0} 的状态更新仍在进行中")]
    TransitionInFlight(i64),

    #[error("模板已应用: {0}")]
    TemplateAlreadyApplied(String),

    #[error("模板未应用: {0}")]
    TemplateNotApplied(String),

    #[error("外部服务错误: {0}")]
    Service(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClinicError {
    /// 是否为提交前即被拒绝的校验类错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClinicError::Validation(_)
                | ClinicError::TemplateAlreadyApplied(_)
                | ClinicError::TemplateNotApplied(_)
        )
    }
}

/// 门诊系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
