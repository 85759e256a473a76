//! Cloud Run 部署配置

use std::collections::BTreeMap;

use super::env::{get_opt, get_or, process_env, GcpProject, Lookup};

/// 注入到服务里的环境变量（空值会被跳过）
const FORWARDED_VARS: &[&str] = &[
    "DB_HOST",
    "DB_PORT",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "JWT_SECRET_KEY",
];

/// 部署配置，进程启动时构造一次，之后不可变
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployConfig {
    pub project: GcpProject,
    pub service_name: String,
    /// 镜像引用，默认 `gcr.io/<project>/<service>:latest`
    pub image: String,
    /// Cloud Build 上传的源码目录
    pub source_dir: String,
    pub memory: String,
    pub cpu: String,
    pub env_vars: BTreeMap<String, String>,
}

impl DeployConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let project = GcpProject::from_lookup(lookup);
        let service_name = get_or(lookup, "SERVICE_NAME", "serenvoice-backend");
        let image = get_opt(lookup, "IMAGE").unwrap_or_else(|| {
            format!("gcr.io/{}/{}:latest", project.project_id, service_name)
        });

        let mut env_vars = BTreeMap::new();
        env_vars.insert("FLASK_ENV".to_string(), "production".to_string());
        for key in FORWARDED_VARS {
            env_vars.insert(key.to_string(), lookup(key).unwrap_or_default());
        }

        Self {
            project,
            service_name,
            image,
            source_dir: get_or(lookup, "BUILD_SOURCE", "./backend"),
            memory: get_or(lookup, "MEMORY", "512Mi"),
            cpu: get_or(lookup, "CPU", "1"),
            env_vars,
        }
    }

    /// `KEY=VALUE` 逗号拼接，按键排序，跳过空值；没有可用变量时返回 None
    pub fn env_vars_flag(&self) -> Option<String> {
        let pairs: Vec<String> = self
            .env_vars
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join(","))
        }
    }
}
