//! Web服务器

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use boneage_core::{BoneAgeError, Result};
use boneage_integration::{InferenceGateway, UploadPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{age, analyze, api_root, health, report, report_text};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn InferenceGateway>,
    pub upload_policy: UploadPolicy,
}

impl AppState {
    pub fn new(gateway: Arc<dyn InferenceGateway>, upload_policy: UploadPolicy) -> Self {
        Self {
            gateway,
            upload_policy,
        }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = create_app(state);
        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| BoneAgeError::Internal(format!("Failed to start web server: {}", e)))?;

        Ok(())
    }
}

/// 请求体上限：base64 编码后的影像加上 JSON 字段余量
pub fn body_limit_for(policy: &UploadPolicy) -> usize {
    let raw = usize::try_from(policy.max_size_bytes()).unwrap_or(usize::MAX);
    raw.div_ceil(3)
        .saturating_mul(4)
        .saturating_add(64 * 1024)
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = body_limit_for(&state.upload_policy);

    Router::new()
        // 根路径
        .route("/", get(api_root))
        // 健康检查
        .route("/health", get(health))
        // API路由
        .nest("/api", api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// API 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/age", post(age))
        .route("/report", post(report))
        .route("/report/text", post(report_text))
}
