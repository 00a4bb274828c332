//! 错误定义模块

use thiserror::Error;

/// 骨龄分析系统统一错误类型
#[derive(Error, Debug)]
pub enum BoneAgeError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("不支持的文件类型: {0}")]
    UnsupportedFileType(String),

    #[error("文件过大: {size} 字节，上限 {limit} 字节")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("请求体过大: {0}")]
    RequestTooLarge(String),

    #[error("缺少推理服务凭据: {0}")]
    MissingCredentials(String),

    #[error("推理网关错误: {0}")]
    Gateway(String),

    #[error("推理结果格式错误: {0}")]
    MalformedResponse(String),

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },
}

impl BoneAgeError {
    /// 是否为上传前的本地校验错误（用户可立即重试）
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedFileType(_)
                | Self::FileTooLarge { .. }
                | Self::RequestTooLarge(_)
        )
    }
}

/// 骨龄分析系统统一结果类型
pub type Result<T> = std::result::Result<T, BoneAgeError>;
