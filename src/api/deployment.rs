//! 部署信息
//!
//! /monitor-deployment 返回函数运行环境的元数据

use axum::{extract::State, routing::any, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::domain::event::Envelope;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/monitor-deployment", any(monitor_deployment))
}

async fn monitor_deployment(State(state): State<Arc<AppState>>) -> Json<Envelope<Value>> {
    state.logger.info("Deployment monitor invoked");

    let d = &state.deployment;
    let info = json!({
        "project_id": d.project_id,
        "region": d.region,
        "function": d.function,
        "memory": d.memory,
        "timestamp": Utc::now(),
        "environment": "production",
        "version": VERSION,
    });

    Json(Envelope::ok("Deployment information", info))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{app, body_string, send};
    use serde_json::Value;

    #[tokio::test]
    async fn test_reports_metadata() {
        let (router, _rx) = app();
        let response = send(router, "GET", "/monitor-deployment", "").await;
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();

        let data = &body["data"];
        assert_eq!(data["project_id"], "demo");
        assert_eq!(data["region"], "us-central1");
        assert_eq!(data["memory"], "256");
        assert_eq!(data["environment"], "production");
    }
}
