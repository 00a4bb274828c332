//! 骨龄分析服务主程序

mod config;

use anyhow::{Context, Result};
use boneage_integration::create_gateway;
use boneage_web::{AppState, WebServer};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// 骨龄分析服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "boneage-server")]
#[command(about = "手部X光骨龄分析与生长预测服务")]
struct Args {
    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,

    /// 离线模式，不调用外部推理服务
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut app_config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        app_config.server.host = host;
    }
    if let Some(port) = args.port {
        app_config.server.port = port;
    }
    if let Some(level) = args.log_level {
        app_config.logging.level = level;
    }
    if args.offline {
        app_config.gateway.offline = true;
    }
    app_config.validate()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&app_config.logging.level))
        .init();

    info!("启动骨龄分析服务...");
    info!("服务配置:");
    info!("  监听地址: {}", app_config.listen_addr());
    info!("  推理模型: {}", app_config.gateway.model);
    info!("  上传上限: {} MB", app_config.upload.max_size_mb);
    info!("  支持格式: {}", app_config.upload.allowed_extensions.join(", "));

    if !app_config.gateway.offline && app_config.gateway.api_key.is_none() {
        warn!("未配置推理服务 API 密钥，分析请求将返回错误");
    }

    let addr: SocketAddr = app_config
        .listen_addr()
        .parse()
        .with_context(|| format!("无效的监听地址: {}", app_config.listen_addr()))?;

    let gateway = create_gateway(app_config.gateway.clone())?;
    let state = AppState::new(Arc::from(gateway), app_config.upload.clone());
    let server = WebServer::new(addr, state);

    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}
