//! 情绪分析通知
//!
//! POST /notify-emotion-analysis：记录分析结果，强度超过阈值时额外写一条警告。
//! OPTIONS 为浏览器预检请求。

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use std::sync::Arc;

use crate::domain::event::{EmotionAnalysis, Envelope, Severity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/notify-emotion-analysis", any(notify_emotion_analysis))
}

async fn notify_emotion_analysis(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> ApiResult<Response> {
    if method == Method::OPTIONS {
        return Ok(preflight());
    }
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }

    let analysis: EmotionAnalysis = serde_json::from_slice(&body).map_err(|e| {
        state
            .logger
            .log_with(Severity::Error, "Failed to decode emotion analysis", &e.to_string());
        ApiError::bad_request("Invalid payload")
    })?;

    state
        .logger
        .log_with(Severity::Info, "Emotion analysis received", &analysis);

    if analysis.is_high_intensity() {
        state
            .logger
            .log_with(Severity::Warning, "High intensity emotion detected", &analysis);
    }

    Ok(Json(Envelope::ok("Analysis processed", analysis)).into_response())
}

fn preflight() -> Response {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{app, body_string, drain_severities, send};
    use crate::domain::event::Severity;
    use axum::http::StatusCode;
    use serde_json::Value;

    async fn notify(intensity: f64) -> Vec<Severity> {
        let (router, mut rx) = app();
        let body = format!(
            r#"{{"user_id":1,"emotion":"ansiedad","intensity":{},"audio_id":2}}"#,
            intensity
        );
        let response = send(router, "POST", "/notify-emotion-analysis", &body).await;
        assert_eq!(response.status(), StatusCode::OK);
        drain_severities(&mut rx)
    }

    #[tokio::test]
    async fn test_high_intensity_warns() {
        assert_eq!(notify(0.9).await, vec![Severity::Info, Severity::Warning]);
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        assert_eq!(notify(0.5).await, vec![Severity::Info]);
        assert_eq!(notify(0.8).await, vec![Severity::Info]);
    }

    #[tokio::test]
    async fn test_echoes_payload() {
        let (router, _rx) = app();
        let response = send(
            router,
            "POST",
            "/notify-emotion-analysis",
            r#"{"user_id":5,"emotion":"calma","intensity":0.2,"audio_id":9}"#,
        )
        .await;
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["message"], "Analysis processed");
        assert_eq!(body["data"]["audio_id"], 9);
    }

    #[tokio::test]
    async fn test_null_numbers_are_accepted() {
        let (router, mut rx) = app();
        let response = send(
            router,
            "POST",
            "/notify-emotion-analysis",
            r#"{"user_id":1,"emotion":"calma","intensity":null,"audio_id":null}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["data"]["intensity"], 0.0);
        assert_eq!(body["data"]["audio_id"], 0);
        assert_eq!(drain_severities(&mut rx), vec![Severity::Info]);
    }

    #[tokio::test]
    async fn test_preflight() {
        let (router, mut rx) = app();
        let response = send(router, "OPTIONS", "/notify-emotion-analysis", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
        assert!(drain_severities(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_rejects_get_and_bad_json() {
        let (router, _rx) = app();
        let response = send(router, "GET", "/notify-emotion-analysis", "").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let (router, _rx) = app();
        let response = send(router, "POST", "/notify-emotion-analysis", "{\"intensity\": ").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
