//! 错误定义模块

use thiserror::Error;

/// 合成系统统一错误类型
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("分布无效: {label} ({reason})")]
    InvalidDistribution { label: String, reason: String },

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("本体服务错误: {0}")]
    Ontology(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },
}

/// 合成系统统一结果类型
pub type Result<T> = std::result::Result<T, SynthError>;
