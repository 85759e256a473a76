//! Cloud Run 资源查看与导出
//!
//! 列出服务、读取指标、写出 JSON 快照。列出或读取失败都降级为空结果，
//! 导出文件始终会写出。

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;

use crate::domain::resource::{MetricPoint, MetricsWindow, ResourceExport, ServiceStatus};
use crate::error::OpsResult;
use crate::infra::monitoring::service_filter;
use crate::infra::{CloudLogger, CloudRunClient, MonitoringClient};
use crate::services::policy::StepResultExt;

pub struct ResourceManager {
    project_id: String,
    region: String,
    run: CloudRunClient,
    monitoring: MonitoringClient,
    logger: CloudLogger,
    window: MetricsWindow,
}

impl ResourceManager {
    pub fn new(
        project_id: impl Into<String>,
        region: impl Into<String>,
        run: CloudRunClient,
        monitoring: MonitoringClient,
        logger: CloudLogger,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
            run,
            monitoring,
            logger,
            window: MetricsWindow::default(),
        }
    }

    pub fn with_window(mut self, window: MetricsWindow) -> Self {
        self.window = window;
        self
    }

    pub async fn list_services(&self) -> OpsResult<Vec<ServiceStatus>> {
        let services = self.run.list_services(&self.project_id).await?;
        self.logger
            .info(&format!("Found {} Cloud Run services", services.len()));
        Ok(services)
    }

    pub async fn service_metrics(&self, service: &str) -> OpsResult<Vec<MetricPoint>> {
        let (start, end) = self.window.interval(Utc::now());
        self.monitoring
            .list_time_series(&self.project_id, &service_filter(service), start, end)
            .await
    }

    /// 写出快照到 `path`，返回写出的内容
    pub async fn export(&self, path: &Path) -> OpsResult<ResourceExport> {
        let services = self
            .list_services()
            .await
            .or_degrade("list services", &self.logger)
            .unwrap_or_default();

        let mut metrics = BTreeMap::new();
        for service in &services {
            let points = self
                .service_metrics(&service.name)
                .await
                .or_degrade(&format!("metrics for {}", service.name), &self.logger)
                .unwrap_or_default();
            metrics.insert(service.name.clone(), points);
        }

        let export = ResourceExport {
            project_id: self.project_id.clone(),
            region: self.region.clone(),
            services,
            metrics,
            exported_at: Utc::now(),
        };

        let json = serde_json::to_vec_pretty(&export)?;
        tokio::fs::write(path, json).await?;

        self.logger
            .info(&format!("Resources exported to {}", path.display()));
        Ok(export)
    }
}

pub fn print_services(services: &[ServiceStatus]) {
    if services.is_empty() {
        println!("No Cloud Run services found");
        return;
    }
    for s in services {
        println!("{}", s.name);
        println!("   URL:      {}", s.url);
        println!("   Status:   {}", s.status);
        println!("   Revision: {}", s.revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::google::testing::{api, serve};
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};

    async fn manager(router: Router) -> ResourceManager {
        let base = serve(router).await;
        ResourceManager::new(
            "demo",
            "us-central1",
            CloudRunClient::with_base_url(api(), base.clone()),
            MonitoringClient::with_base_url(api(), base),
            CloudLogger::console("test"),
        )
    }

    #[tokio::test]
    async fn test_export_survives_listing_failure() {
        let router = Router::new().route(
            "/apis/serving.knative.dev/v1/namespaces/demo/services",
            get(|| async { (StatusCode::FORBIDDEN, "permission denied") }),
        );
        let mgr = manager(router).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources_export.json");

        let export = mgr.export(&path).await.unwrap();
        assert!(export.services.is_empty());

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["project_id"], "demo");
        assert_eq!(written["region"], "us-central1");
        assert_eq!(written["services"], json!([]));
        assert!(written["exported_at"].is_string());
    }

    #[tokio::test]
    async fn test_export_collects_metrics_per_service() {
        let router = Router::new()
            .route(
                "/apis/serving.knative.dev/v1/namespaces/demo/services",
                get(|| async {
                    Json(json!({
                        "items": [{
                            "metadata": { "name": "serenvoice-backend" },
                            "status": {
                                "url": "https://backend.a.run.app",
                                "conditions": [{ "type": "Ready", "status": "True" }],
                                "traffic": [{ "revisionName": "serenvoice-backend-00002" }]
                            }
                        }]
                    }))
                }),
            )
            .route(
                "/projects/demo/timeSeries",
                get(|| async {
                    Json(json!({
                        "timeSeries": [{
                            "metric": { "type": "run.googleapis.com/request_count" },
                            "points": [{ "value": { "int64Value": "42" } }]
                        }]
                    }))
                }),
            );
        let mgr = manager(router).await.with_window(MetricsWindow::All);
        let dir = tempfile::tempdir().unwrap();

        let export = mgr.export(&dir.path().join("out.json")).await.unwrap();
        assert_eq!(export.services.len(), 1);
        let points = &export.metrics["serenvoice-backend"];
        assert_eq!(points[0].name, "run.googleapis.com/request_count");
        assert_eq!(points[0].value, 42.0);
    }

    #[tokio::test]
    async fn test_metric_failure_degrades_to_empty() {
        let router = Router::new()
            .route(
                "/apis/serving.knative.dev/v1/namespaces/demo/services",
                get(|| async {
                    Json(json!({ "items": [{ "metadata": { "name": "svc" }, "status": {} }] }))
                }),
            )
            .route(
                "/projects/demo/timeSeries",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let mgr = manager(router).await;
        let dir = tempfile::tempdir().unwrap();

        let export = mgr.export(&dir.path().join("out.json")).await.unwrap();
        assert_eq!(export.services[0].status, "Unknown");
        assert!(export.metrics["svc"].is_empty());
    }
}
