//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod compute;
pub mod deploy;
pub mod event;
pub mod resource;

// Re-exports for convenience
pub use deploy::{DeployStage, DeploymentResult, HealthVerdict, StageStatus};
pub use event::{AlertKind, AlertPayload, EmotionAnalysis, Envelope, HealthEvent, Severity};
pub use resource::{MetricPoint, MetricsWindow, ResourceExport, ServiceStatus};
