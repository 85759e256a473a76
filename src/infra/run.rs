//! Cloud Run Admin API（Knative v1）客户端

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::resource::ServiceStatus;
use crate::error::OpsResult;
use crate::infra::google::GoogleApi;

const RUN_BASE_URL: &str = "https://run.googleapis.com";

#[derive(Clone)]
pub struct CloudRunClient {
    api: GoogleApi,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceList {
    #[serde(default)]
    items: Vec<KnativeService>,
}

#[derive(Debug, Default, Deserialize)]
struct KnativeService {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    status: KnativeServiceStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct KnativeServiceStatus {
    #[serde(default)]
    url: String,
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default)]
    traffic: Vec<TrafficTarget>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Condition {
    #[serde(default)]
    status: String,
    #[serde(default)]
    last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrafficTarget {
    #[serde(default)]
    revision_name: String,
}

impl From<KnativeService> for ServiceStatus {
    fn from(svc: KnativeService) -> Self {
        let first = svc.status.conditions.first();
        ServiceStatus {
            name: svc.metadata.name,
            url: svc.status.url,
            status: first
                .map(|c| c.status.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            revision: svc
                .status
                .traffic
                .first()
                .map(|t| t.revision_name.clone())
                .unwrap_or_default(),
            updated_at: first
                .and_then(|c| c.last_transition_time)
                .or(svc.metadata.creation_timestamp),
        }
    }
}

impl CloudRunClient {
    pub fn new(api: GoogleApi) -> Self {
        Self::with_base_url(api, RUN_BASE_URL)
    }

    pub fn with_base_url(api: GoogleApi, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 列出项目下的所有服务
    pub async fn list_services(&self, project: &str) -> OpsResult<Vec<ServiceStatus>> {
        let url = format!(
            "{}/apis/serving.knative.dev/v1/namespaces/{}/services",
            self.base_url, project
        );
        let list: ServiceList = self.api.get(&url, &[]).await?;
        Ok(list.items.into_iter().map(ServiceStatus::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::google::testing::{api, serve};
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    #[tokio::test]
    async fn test_list_services_maps_status() {
        let router = Router::new().route(
            "/apis/serving.knative.dev/v1/namespaces/demo/services",
            get(|| async {
                Json(json!({
                    "items": [
                        {
                            "metadata": { "name": "serenvoice-backend" },
                            "status": {
                                "url": "https://serenvoice-backend-abc.a.run.app",
                                "conditions": [
                                    { "type": "Ready", "status": "True",
                                      "lastTransitionTime": "2025-05-01T10:00:00Z" }
                                ],
                                "traffic": [ { "revisionName": "serenvoice-backend-00042-xyz", "percent": 100 } ]
                            }
                        },
                        { "metadata": { "name": "bare" }, "status": {} }
                    ]
                }))
            }),
        );
        let client = CloudRunClient::with_base_url(api(), serve(router).await);

        let services = client.list_services("demo").await.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].status, "True");
        assert_eq!(services[0].revision, "serenvoice-backend-00042-xyz");
        assert!(services[0].updated_at.is_some());
        assert_eq!(services[1].status, "Unknown");
        assert_eq!(services[1].revision, "");
    }
}
