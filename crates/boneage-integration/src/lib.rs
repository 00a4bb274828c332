//! # 骨龄集成模块
//!
//! 提供与外部视觉模型的集成功能，包括：
//! - 上传影像校验：文件类型与大小上限，在任何网络请求之前执行
//! - 影像数据解码：原始字节与 Data URL
//! - 推理网关：受 JSON Schema 约束的视觉模型调用与结果规整

pub mod gateway;
pub mod upload;

pub use gateway::{
    create_gateway, GatewayConfig, HttpVisionGateway, InferenceGateway, OfflineGateway,
};
pub use upload::{ImagePayload, UploadPolicy};
