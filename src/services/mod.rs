//! 服务层模块
//!
//! 部署、创建 VM、资源导出三个工作流

pub mod deploy;
pub mod inspect;
pub mod policy;
pub mod provision;

pub use deploy::Deployer;
pub use inspect::ResourceManager;
pub use policy::StepResultExt;
pub use provision::Provisioner;
