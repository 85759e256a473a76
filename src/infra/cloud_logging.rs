//! Cloud Logging 日志句柄
//!
//! `CloudLogger` 由调用方显式创建并传入各工作流 / handler，不使用全局变量。
//! 每条日志同时：
//! 1. 以对应级别输出到 tracing（控制台）
//! 2. 发送到后台任务，批量写入 Cloud Logging `entries:write`
//!
//! 初始化与关闭顺序：
//! 1. 初始化 tracing subscriber
//! 2. `CloudLogger::start` 得到 (logger, flusher)
//! 3. 运行工作流或 HTTP 服务，按需 clone logger
//! 4. drop 所有 logger（发送端全部关闭后后台任务才会退出）
//! 5. `LogFlusher::shutdown` 等待剩余日志写完

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::event::Severity;
use crate::error::OpsResult;
use crate::infra::google::GoogleApi;

const LOGGING_BASE_URL: &str = "https://logging.googleapis.com/v2";

/// 每次 entries:write 的最大条数
const MAX_ENTRIES_PER_BATCH: usize = 100;

/// 待写入日志的缓冲上限，写满后丢弃新日志
const LOG_CHANNEL_CAPACITY: usize = 1024;

/// 关闭时等待后台写入的上限
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// 一条日志
#[derive(Clone, Debug, Serialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn to_wire(&self) -> Value {
        json!({
            "severity": self.severity,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "jsonPayload": {
                "message": self.message,
                "data": self.data,
            }
        })
    }
}

/// Cloud Logging 写入客户端
#[derive(Clone)]
pub struct LoggingClient {
    api: GoogleApi,
    base_url: String,
    log_name: String,
}

impl LoggingClient {
    /// `log_id` 例如 `serenvoice-deploy`
    pub fn new(api: GoogleApi, project_id: &str, log_id: &str) -> Self {
        Self::with_base_url(api, LOGGING_BASE_URL, project_id, log_id)
    }

    pub fn with_base_url(
        api: GoogleApi,
        base_url: impl Into<String>,
        project_id: &str,
        log_id: &str,
    ) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            log_name: format!("projects/{}/logs/{}", project_id, log_id),
        }
    }

    pub async fn write_entries(&self, entries: &[LogEntry]) -> OpsResult<()> {
        let url = format!("{}/entries:write", self.base_url);
        let body = json!({
            "logName": self.log_name,
            "resource": { "type": "global" },
            "entries": entries.iter().map(LogEntry::to_wire).collect::<Vec<_>>(),
        });
        let _: Value = self.api.post(&url, &body).await?;
        Ok(())
    }
}

/// 日志句柄，可 clone
#[derive(Clone, Debug)]
pub struct CloudLogger {
    log_id: String,
    tx: Option<mpsc::Sender<LogEntry>>,
}

/// 后台写入任务的句柄
pub struct LogFlusher {
    task: Option<JoinHandle<()>>,
}

impl CloudLogger {
    /// 只输出到控制台
    pub fn console(log_id: &str) -> Self {
        Self {
            log_id: log_id.to_string(),
            tx: None,
        }
    }

    /// 启动后台写入任务；`client` 为 None 时等同于 `console`
    pub fn start(log_id: &str, client: Option<LoggingClient>) -> (Self, LogFlusher) {
        let Some(client) = client else {
            return (Self::console(log_id), LogFlusher { task: None });
        };

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let task = tokio::spawn(flush_loop(client, rx));

        (
            Self {
                log_id: log_id.to_string(),
                tx: Some(tx),
            },
            LogFlusher { task: Some(task) },
        )
    }

    /// 测试用：返回接收端以检查写出的日志
    #[cfg(test)]
    pub(crate) fn capture(log_id: &str) -> (Self, mpsc::Receiver<LogEntry>) {
        Self::capture_with_capacity(log_id, LOG_CHANNEL_CAPACITY)
    }

    #[cfg(test)]
    fn capture_with_capacity(log_id: &str, capacity: usize) -> (Self, mpsc::Receiver<LogEntry>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                log_id: log_id.to_string(),
                tx: Some(tx),
            },
            rx,
        )
    }

    pub fn log(&self, severity: Severity, message: &str) {
        self.emit(severity, message, None);
    }

    /// 附带结构化数据
    pub fn log_with<T: Serialize + ?Sized>(&self, severity: Severity, message: &str, data: &T) {
        let data = serde_json::to_value(data).ok();
        self.emit(severity, message, data);
    }

    pub fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }

    fn emit(&self, severity: Severity, message: &str, data: Option<Value>) {
        let log_id = self.log_id.as_str();
        let data_str = data.as_ref().map(Value::to_string).unwrap_or_default();
        match severity {
            Severity::Default | Severity::Debug => {
                debug!(log = log_id, severity = %severity, data = %data_str, "{}", message)
            }
            Severity::Info | Severity::Notice => {
                info!(log = log_id, severity = %severity, data = %data_str, "{}", message)
            }
            Severity::Warning => {
                warn!(log = log_id, severity = %severity, data = %data_str, "{}", message)
            }
            _ => error!(log = log_id, severity = %severity, data = %data_str, "{}", message),
        }

        if let Some(tx) = &self.tx {
            let entry = LogEntry {
                severity,
                message: message.to_string(),
                data,
                timestamp: Utc::now(),
            };
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(entry) {
                warn!(log = log_id, "Cloud Logging buffer full, dropping entry");
            }
        }
    }
}

impl LogFlusher {
    /// 等待剩余日志写完。调用前需 drop 所有 `CloudLogger`
    pub async fn shutdown(self) {
        let Some(task) = self.task else {
            return;
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
            warn!("Cloud Logging flush timed out, some entries may be lost");
        }
    }
}

async fn flush_loop(client: LoggingClient, mut rx: mpsc::Receiver<LogEntry>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while batch.len() < MAX_ENTRIES_PER_BATCH {
            match rx.try_recv() {
                Ok(entry) => batch.push(entry),
                Err(_) => break,
            }
        }

        // 失败只打到控制台，避免递归
        if let Err(e) = client.write_entries(&batch).await {
            warn!(error = %e, count = batch.len(), "Failed to write entries to Cloud Logging");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::google::testing::{api, serve};
    use axum::{extract::State, http::Uri, Json, Router};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_capture_records_severity_and_data() {
        let (logger, mut rx) = CloudLogger::capture("test");
        logger.log_with(Severity::Alert, "critical", &json!({ "user_id": 7 }));
        logger.info("plain");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.severity, Severity::Alert);
        assert_eq!(first.data.unwrap()["user_id"], 7);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.severity, Severity::Info);
        assert!(second.data.is_none());
    }

    #[tokio::test]
    async fn test_flusher_writes_pending_entries_on_shutdown() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        // 路径里的冒号会被当成参数，用 fallback 接收
        let router = Router::new()
            .fallback(
                |State(store): State<Arc<Mutex<Vec<Value>>>>, uri: Uri, Json(body): Json<Value>| async move {
                    assert_eq!(uri.path(), "/entries:write");
                    store.lock().unwrap().push(body);
                    Json(json!({}))
                },
            )
            .with_state(received.clone());
        let base = serve(router).await;

        let client = LoggingClient::with_base_url(api(), base, "demo", "serenvoice-deploy");
        let (logger, flusher) = CloudLogger::start("serenvoice-deploy", Some(client));
        logger.warning("rollback started");
        logger.info("rollback done");
        drop(logger);
        flusher.shutdown().await;

        let bodies = received.lock().unwrap();
        let entries: Vec<&Value> = bodies
            .iter()
            .flat_map(|b| b["entries"].as_array().unwrap().iter())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(bodies[0]["logName"], "projects/demo/logs/serenvoice-deploy");
        assert_eq!(entries[0]["severity"], "WARNING");
        assert_eq!(entries[0]["jsonPayload"]["message"], "rollback started");
    }

    #[tokio::test]
    async fn test_full_buffer_drops_new_entries() {
        let (logger, mut rx) = CloudLogger::capture_with_capacity("test", 2);
        logger.info("one");
        logger.info("two");
        logger.error("three");
        drop(logger);

        let mut messages = Vec::new();
        while let Some(entry) = rx.recv().await {
            messages.push(entry.message);
        }
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_console_logger_shutdown_is_noop() {
        let (logger, flusher) = CloudLogger::start("x", None);
        logger.error("only console");
        flusher.shutdown().await;
    }
}
