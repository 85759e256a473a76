//! 环境变量配置加载
//!
//! 所有配置都来自环境变量，缺省时使用硬编码默认值。
//! 各配置结构体的 `from_lookup` 接受一个查找函数，`from_env` 只是以进程环境调用它，
//! 这样测试无需修改进程环境。

use std::env;

/// 环境变量查找函数
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// 从进程环境查找
pub fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// 读取变量，空字符串视为未设置
pub fn get_opt(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

/// 读取变量，未设置或为空时返回默认值
pub fn get_or(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    get_opt(lookup, key).unwrap_or_else(|| default.to_string())
}

/// 读取布尔开关（`1` / `true`）
pub fn get_flag(lookup: Lookup<'_>, key: &str) -> bool {
    get_opt(lookup, key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// GCP 项目与区域
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcpProject {
    pub project_id: String,
    pub region: String,
}

impl GcpProject {
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            project_id: get_or(lookup, "GCP_PROJECT_ID", constants::DEFAULT_PROJECT_ID),
            region: get_or(lookup, "GCP_REGION", constants::DEFAULT_REGION),
        }
    }
}

/// Cloud Logging 是否启用（`CLOUD_LOGGING_DISABLED=1` 时关闭，只输出到控制台）
pub fn cloud_logging_enabled(lookup: Lookup<'_>) -> bool {
    !get_flag(lookup, "CLOUD_LOGGING_DISABLED")
}

/// 常量
pub mod constants {
    pub const DEFAULT_PROJECT_ID: &str = "boreal-dock-481001-k0";
    pub const DEFAULT_REGION: &str = "us-central1";
    pub const DEFAULT_ZONE: &str = "us-central1-a";

    /// gcloud 命令超时（秒）
    pub const COMMAND_TIMEOUT_SECS: u64 = 1800; // 30 分钟

    /// 部署后健康检查前的等待（秒）
    pub const HEALTH_CHECK_DELAY_SECS: u64 = 5;

    /// 创建 VM 后读取外部 IP 前的等待（秒）
    pub const EXTERNAL_IP_DELAY_SECS: u64 = 10;

    /// 全局操作轮询间隔（秒）
    pub const GLOBAL_OPERATION_POLL_SECS: u64 = 2;

    /// 区域操作轮询间隔（秒）
    pub const ZONE_OPERATION_POLL_SECS: u64 = 3;

    /// 情绪强度告警阈值（严格大于）
    pub const HIGH_INTENSITY_THRESHOLD: f64 = 0.8;

    /// Webhook 服务默认端口
    pub const DEFAULT_FUNCTION_PORT: u16 = 8080;

    /// 资源导出默认文件
    pub const DEFAULT_EXPORT_FILE: &str = "resources_export.json";

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    /// 由键值对构造查找函数
    pub fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }
}
