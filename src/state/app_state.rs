//! 应用状态

use crate::config::DeploymentMetadata;
use crate::infra::CloudLogger;

/// Webhook handler 共享的状态，创建后只读
pub struct AppState {
    /// 日志句柄
    pub logger: CloudLogger,
    /// `/monitor-deployment` 返回的部署信息
    pub deployment: DeploymentMetadata,
}

impl AppState {
    pub fn new(logger: CloudLogger, deployment: DeploymentMetadata) -> Self {
        Self { logger, deployment }
    }
}
