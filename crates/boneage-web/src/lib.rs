//! # 骨龄 Web 接口
//!
//! 为浏览器前端提供 HTTP 接口：影像分析代理、年龄计算与结果报告。

pub mod handlers;
pub mod server;

pub use handlers::ApiError;
pub use server::{create_app, AppState, WebServer};
