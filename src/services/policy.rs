//! 每个步骤的失败处理策略
//!
//! 调用点显式声明失败时是中止还是降级：
//! - `or_abort`：记录错误并向上返回（创建 VM）
//! - `or_degrade`：记录警告，返回 None，由调用方使用默认值（防火墙、列出服务、指标、外部 IP）

use crate::error::{OpsError, OpsResult};
use crate::infra::CloudLogger;

pub trait StepResultExt<T> {
    /// 失败时中止，错误带上步骤名
    fn or_abort(self, step: &str, logger: &CloudLogger) -> OpsResult<T>;

    /// 失败时降级为 None
    fn or_degrade(self, step: &str, logger: &CloudLogger) -> Option<T>;
}

impl<T> StepResultExt<T> for OpsResult<T> {
    fn or_abort(self, step: &str, logger: &CloudLogger) -> OpsResult<T> {
        self.map_err(|e| {
            logger.error(&format!("{} failed: {}", step, e));
            OpsError::Step {
                step: step.to_string(),
                source: Box::new(e),
            }
        })
    }

    fn or_degrade(self, step: &str, logger: &CloudLogger) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                logger.warning(&format!("{} failed, continuing: {}", step, e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    #[tokio::test]
    async fn test_degrade_logs_warning_and_returns_none() {
        let (logger, mut rx) = CloudLogger::capture("test");
        let result: OpsResult<u32> = Err(OpsError::NoExternalIp("vm".into()));

        assert_eq!(result.or_degrade("external ip", &logger), None);
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.severity, Severity::Warning);
        assert!(entry.message.starts_with("external ip failed"));
    }

    #[tokio::test]
    async fn test_abort_wraps_step_name() {
        let (logger, mut rx) = CloudLogger::capture("test");
        let result: OpsResult<u32> = Err(OpsError::Auth("expired".into()));

        let err = result.or_abort("create vm", &logger).unwrap_err();
        assert!(matches!(err, OpsError::Step { ref step, .. } if step == "create vm"));
        assert_eq!(rx.recv().await.unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_ok_passes_through() {
        let logger = CloudLogger::console("test");
        let ok: OpsResult<u32> = Ok(3);
        assert_eq!(ok.or_abort("x", &logger).unwrap(), 3);
        let ok: OpsResult<u32> = Ok(4);
        assert_eq!(ok.or_degrade("x", &logger), Some(4));
    }
}
