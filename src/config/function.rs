//! Webhook 函数的运行时信息

use super::env::{constants, process_env, GcpProject, Lookup};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionConfig {
    pub project: GcpProject,
    pub port: u16,
    /// `/monitor-deployment` 返回的元数据，原样取自环境（可能为空）
    pub deployment: DeploymentMetadata,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeploymentMetadata {
    pub project_id: String,
    pub region: String,
    pub function: String,
    pub memory: String,
}

impl FunctionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let port = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_FUNCTION_PORT);

        let raw = |key: &str| lookup(key).unwrap_or_default();
        let deployment = DeploymentMetadata {
            project_id: raw("GCP_PROJECT_ID"),
            region: raw("FUNCTION_REGION"),
            function: raw("FUNCTION_NAME"),
            memory: raw("FUNCTION_MEMORY_MB"),
        };

        Self {
            project: GcpProject::from_lookup(lookup),
            port,
            deployment,
        }
    }
}
