//! 基础设施模块
//!
//! 封装外部依赖（gcloud 命令、Google Cloud REST、Cloud Logging）

pub mod auth;
pub mod cloud_logging;
pub mod command;
pub mod compute;
pub mod google;
pub mod monitoring;
pub mod run;

pub use auth::{TokenProvider, TokenSource};
pub use cloud_logging::{CloudLogger, LogFlusher, LoggingClient};
pub use command::{CommandExecutor, CommandRunner, OutputMode};
pub use compute::ComputeClient;
pub use google::GoogleApi;
pub use monitoring::MonitoringClient;
pub use run::CloudRunClient;
