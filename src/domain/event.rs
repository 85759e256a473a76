//! Webhook 事件与响应模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::env::constants::HIGH_INTENSITY_THRESHOLD;

/// Cloud Logging 日志级别
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 显式的 `null` 与缺省字段一样取零值
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 系统上报的告警
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertPayload {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data: serde_json::Map<String, serde_json::Value>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// 告警分类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    EmotionCritical,
    SystemError,
    UserActivity,
    Generic,
}

impl AlertKind {
    /// 按 `type` 字段分类，未知类型归为 Generic
    pub fn classify(kind: &str) -> Self {
        match kind {
            "emotion_critical" => AlertKind::EmotionCritical,
            "system_error" => AlertKind::SystemError,
            "user_activity" => AlertKind::UserActivity,
            _ => AlertKind::Generic,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::EmotionCritical => Severity::Alert,
            AlertKind::SystemError => Severity::Error,
            AlertKind::UserActivity | AlertKind::Generic => Severity::Info,
        }
    }

    pub fn log_message(&self) -> &'static str {
        match self {
            AlertKind::EmotionCritical => "Critical emotion alert detected",
            AlertKind::SystemError => "System error reported",
            AlertKind::UserActivity => "User activity recorded",
            AlertKind::Generic => "Generic alert received",
        }
    }
}

/// 后端发来的情绪分析结果
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmotionAnalysis {
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub emotion: String,
    #[serde(deserialize_with = "null_as_default")]
    pub intensity: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub audio_id: i64,
}

impl EmotionAnalysis {
    /// 强度严格大于阈值
    pub fn is_high_intensity(&self) -> bool {
        self.intensity > HIGH_INTENSITY_THRESHOLD
    }
}

/// 组件健康状态
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthEvent {
    pub service: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl HealthEvent {
    pub fn healthy(service: &str, message: &str) -> Self {
        Self {
            service: service.to_string(),
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            message: message.to_string(),
        }
    }
}

/// 标准响应
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }
}
