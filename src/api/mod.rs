//! API 模块
//!
//! Webhook handlers 和路由组装

pub mod alert;
pub mod deployment;
pub mod emotion;
pub mod health;

use axum::{
    http::{header, HeaderValue},
    Router,
};
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的 webhook 路由
///
/// 每个响应都带 `Access-Control-Allow-Origin: *`；预检请求由各 handler 自行处理
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(alert::router())
        .merge(deployment::router())
        .merge(emotion::router())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
