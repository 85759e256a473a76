//! 统一错误处理
//!
//! - `ApiError`：Webhook handler 的错误，实现 `IntoResponse`，响应体为纯文本
//! - `OpsError`：部署 / 创建 VM / 资源导出等工作流的错误

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::infra::command::CommandError;

/// Handler 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 400 - 请求体无法解析
    BadRequest(String),
    /// 405 - 方法不允许
    MethodNotAllowed,
}

impl ApiError {
    /// 创建请求无效错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::MethodNotAllowed => "Method not allowed".to_string(),
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", body),
        )
            .into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::MethodNotAllowed => write!(f, "Method not allowed"),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

/// 工作流错误
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error("command `{program}` failed: {source}")]
    Command {
        program: String,
        #[source]
        source: CommandError,
    },

    #[error("command `{program}` exited with code {code:?}")]
    CommandExit { program: String, code: Option<i32> },

    #[error("Google API {method} {url} returned {status}: {body}")]
    GoogleApi {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to obtain access token: {0}")]
    Auth(String),

    #[error("operation {name} failed: {message}")]
    Operation { name: String, message: String },

    #[error("health check failed: {0}")]
    HealthCheck(String),

    #[error("no external IP found for instance {0}")]
    NoExternalIp(String),

    #[error("{step} cancelled")]
    Cancelled { step: String },

    #[error("{step}: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<OpsError>,
    },
}

impl OpsError {
    /// Google API 返回 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, OpsError::GoogleApi { status: 404, .. })
    }
}

pub type OpsResult<T> = Result<T, OpsError>;
