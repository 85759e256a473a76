//! 健康检查
//!
//! 任意方法的 /health-check 都返回两个组件的健康状态

use axum::{extract::State, routing::any, Json, Router};
use std::sync::Arc;

use crate::domain::event::{Envelope, HealthEvent};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health-check", any(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Envelope<Vec<HealthEvent>>> {
    state.logger.info("Health check invoked");

    let services = vec![
        HealthEvent::healthy("cloud-function", "Cloud Function operational"),
        HealthEvent::healthy("logging", "Cloud Logging connected"),
    ];

    Json(Envelope::ok("System operational", services))
}
