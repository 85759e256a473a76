//! SerenVoice Ops - SerenVoice 部署与运维工具
//!
//! Cloud Run 发布、Compute Engine VM 创建、资源导出，以及 webhook 函数

pub mod error;
pub mod infra;
pub mod domain;
pub mod config;
pub mod state;
pub mod api;
pub mod services;
