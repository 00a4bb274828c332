//! 上传影像校验模块
//!
//! 在调用推理服务之前完成文件类型与大小校验，校验失败时不会发起任何网络请求。

use base64::{engine::general_purpose::STANDARD, Engine as _};
use boneage_core::{BoneAgeError, ImageDescriptor, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// 默认上传大小上限 (MiB)
pub const DEFAULT_MAX_SIZE_MB: u64 = 10;
/// 可配置的上传大小上限 (MiB)
pub const MAX_CONFIGURABLE_SIZE_MB: u64 = 1024;

/// 上传策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// 文件大小上限 (MiB)
    pub max_size_mb: u64,
    /// 允许的扩展名（小写，不含点）
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            allowed_extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadPolicy {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// 校验文件名与大小，返回影像元数据
    pub fn validate_file(&self, file_name: &str, size_bytes: u64) -> Result<ImageDescriptor> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if extension.is_empty() || !self.is_allowed_extension(&extension) {
            warn!("Rejected upload {}: unsupported extension", file_name);
            return Err(BoneAgeError::UnsupportedFileType(format!(
                "{} (支持: {})",
                file_name,
                self.allowed_extensions.join(", ")
            )));
        }

        if size_bytes == 0 {
            return Err(BoneAgeError::Validation(format!("文件为空: {}", file_name)));
        }

        let limit = self.max_size_bytes();
        if size_bytes > limit {
            warn!("Rejected upload {}: {} bytes exceeds {}", file_name, size_bytes, limit);
            return Err(BoneAgeError::FileTooLarge {
                size: size_bytes,
                limit,
            });
        }

        Ok(ImageDescriptor {
            file_name: file_name.to_string(),
            mime_type: mime_for_extension(&extension).to_string(),
            size_bytes,
        })
    }
}

/// 扩展名对应的 MIME 类型
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// MIME 类型对应的默认扩展名
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

/// 已校验的影像数据
#[derive(Debug, Clone)]
pub struct ImagePayload {
    descriptor: ImageDescriptor,
    bytes: Vec<u8>,
}

impl ImagePayload {
    /// 由上传的原始字节构造
    pub fn from_upload(policy: &UploadPolicy, file_name: &str, bytes: Vec<u8>) -> Result<Self> {
        let descriptor = policy.validate_file(file_name, bytes.len() as u64)?;
        Ok(Self { descriptor, bytes })
    }

    /// 由 `data:<mime>;base64,<data>` 形式的 Data URL 构造
    pub fn from_data_url(
        policy: &UploadPolicy,
        data_url: &str,
        file_name: Option<&str>,
    ) -> Result<Self> {
        let data_url = data_url.trim();
        if data_url.is_empty() {
            return Err(BoneAgeError::Validation("缺少影像数据".to_string()));
        }

        let (header, data) = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(|| BoneAgeError::Validation("影像数据不是有效的 Data URL".to_string()))?;

        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| BoneAgeError::Validation("影像数据必须为 base64 编码".to_string()))?;

        let extension = extension_for_mime(mime_type)
            .ok_or_else(|| BoneAgeError::UnsupportedFileType(mime_type.to_string()))?;

        let file_name = match file_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("upload.{}", extension),
        };

        // 先按编码长度粗略估计，避免解码明显超限的数据
        let estimated = (data.len() as u64 / 4) * 3;
        if estimated > policy.max_size_bytes() + 3 {
            policy.validate_file(&file_name, estimated)?;
        }

        let bytes = STANDARD
            .decode(data)
            .map_err(|e| BoneAgeError::Validation(format!("base64 解码失败: {}", e)))?;

        let mut payload = Self::from_upload(policy, &file_name, bytes)?;
        payload.descriptor.mime_type = mime_type.to_ascii_lowercase();
        debug!(
            "Decoded data URL {} ({} bytes)",
            payload.descriptor.file_name, payload.descriptor.size_bytes
        );
        Ok(payload)
    }

    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}
