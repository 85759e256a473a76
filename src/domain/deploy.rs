//! 部署相关领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 版本号格式（由部署完成时间生成）
pub const VERSION_FORMAT: &str = "%Y%m%d-%H%M%S";

/// 阶段状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Success => "success",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

/// 部署阶段信息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployStage {
    /// 阶段标识 (e.g., "build", "deploy", "health_check", "rollback")
    pub name: String,
    /// 显示名称
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
    pub message: Option<String>,
}

impl DeployStage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 跳过阶段
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }
}

/// 一次 `gcloud run deploy` 的结果
#[derive(Clone, Debug, Serialize)]
pub struct DeploymentResult {
    /// 从命令输出中解析出的服务 URL
    pub service_url: Option<String>,
    /// 时间戳版本号，失败时为空
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub message: String,
}

impl DeploymentResult {
    pub fn succeeded(service_url: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            service_url,
            version: at.format(VERSION_FORMAT).to_string(),
            timestamp: at,
            success: true,
            message: "Deployment succeeded".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            service_url: None,
            version: String::new(),
            timestamp: Utc::now(),
            success: false,
            message: message.into(),
        }
    }
}

/// 健康检查结论
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    /// 失败并已尝试回滚
    Unhealthy { reason: String, rolled_back: bool },
    /// 没有解析到 URL，未检查
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deploy_stage_lifecycle() {
        let mut stage = DeployStage::new("build", "Cloud Build");
        assert_eq!(stage.status, StageStatus::Pending);

        stage.start();
        assert_eq!(stage.status, StageStatus::Running);
        assert!(stage.started_at.is_some());

        stage.finish(false, Some("exit 1".to_string()));
        assert_eq!(stage.status, StageStatus::Failed);
        assert!(stage.finished_at.is_some());
        assert!(stage.duration_ms.is_some());
    }

    #[test]
    fn test_skip_keeps_timestamps_empty() {
        let mut stage = DeployStage::new("rollback", "Rollback");
        stage.skip(Some("not needed".to_string()));
        assert_eq!(stage.status.as_str(), "skipped");
        assert!(stage.started_at.is_none());
    }

    #[test]
    fn test_version_is_timestamp_derived() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        let result = DeploymentResult::succeeded(Some("https://x.run.app".into()), at);
        assert_eq!(result.version, "20250307-090501");
        assert!(result.success);
    }
}
