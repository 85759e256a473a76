//! 配置模块
//!
//! 环境变量解析与配置管理

pub mod compute;
pub mod deploy;
pub mod env;
pub mod function;

pub use compute::{FirewallConfig, VmConfig};
pub use deploy::DeployConfig;
pub use env::GcpProject;
pub use function::{DeploymentMetadata, FunctionConfig};
