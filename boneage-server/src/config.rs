//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、TOML 配置文件、`BONEAGE__` 前缀的环境变量。

use anyhow::{Context, Result};
use boneage_integration::{upload::MAX_CONFIGURABLE_SIZE_MB, GatewayConfig, UploadPolicy};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 服务完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 推理网关配置
    pub gateway: GatewayConfig,
    /// 上传策略
    pub upload: UploadPolicy,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 表达式
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 加载配置，`config_path` 为空时只使用默认值与环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("BONEAGE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upload.allowed_extensions")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port 不能为 0");
        }
        if self.upload.max_size_mb == 0 {
            anyhow::bail!("upload.max_size_mb 必须大于 0");
        }
        if self.upload.max_size_mb > MAX_CONFIGURABLE_SIZE_MB {
            anyhow::bail!(
                "upload.max_size_mb 不能超过 {} (当前 {})",
                MAX_CONFIGURABLE_SIZE_MB,
                self.upload.max_size_mb
            );
        }
        if self.upload.allowed_extensions.is_empty() {
            anyhow::bail!("upload.allowed_extensions 不能为空");
        }
        if !self.gateway.offline {
            if self.gateway.endpoint.trim().is_empty() {
                anyhow::bail!("gateway.endpoint 不能为空");
            }
            if self.gateway.model.trim().is_empty() {
                anyhow::bail!("gateway.model 不能为空");
            }
        }
        Ok(())
    }

    /// 监听地址
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
        assert_eq!(config.upload.max_size_mb, 10);
        assert!(config.gateway.api_key.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("boneage-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[gateway]
model = "gemini-1.5-pro"
api_key = "from-file"

[upload]
max_size_mb = 5
allowed_extensions = ["png"]
"#
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.gateway.model, "gemini-1.5-pro");
        assert_eq!(config.gateway.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.upload.max_size_mb, 5);
        assert_eq!(config.upload.allowed_extensions, vec!["png".to_string()]);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.upload.allowed_extensions.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upload.max_size_mb = 0;
        assert!(config.validate().is_err());
        config.upload.max_size_mb = MAX_CONFIGURABLE_SIZE_MB;
        assert!(config.validate().is_ok());
        config.upload.max_size_mb = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.gateway.model = " ".to_string();
        assert!(config.validate().is_err());
        config.gateway.offline = true;
        assert!(config.validate().is_ok());
    }
}
