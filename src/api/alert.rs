//! 告警处理
//!
//! POST /process-alert：按 `type` 分类后以对应级别写日志，原样回显

use axum::{body::Bytes, extract::State, http::Method, routing::any, Json, Router};
use chrono::Utc;
use std::sync::Arc;

use crate::domain::event::{AlertKind, AlertPayload, Envelope, Severity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/process-alert", any(process_alert))
}

async fn process_alert(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> ApiResult<Json<Envelope<AlertPayload>>> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }

    let mut alert: AlertPayload = serde_json::from_slice(&body).map_err(|e| {
        state
            .logger
            .log_with(Severity::Error, "Failed to decode alert", &e.to_string());
        ApiError::bad_request("Invalid payload")
    })?;

    // 以接收时间为准
    alert.timestamp = Some(Utc::now());

    let kind = AlertKind::classify(&alert.kind);
    state.logger.log_with(kind.severity(), kind.log_message(), &alert);

    let message = format!("Alert '{}' processed", alert.kind);
    Ok(Json(Envelope::ok(message, alert)))
}
