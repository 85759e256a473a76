//! Compute Engine v1 客户端

use crate::domain::compute::{Firewall, Instance, Operation};
use crate::error::OpsResult;
use crate::infra::google::GoogleApi;

const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

#[derive(Clone)]
pub struct ComputeClient {
    api: GoogleApi,
    base_url: String,
}

/// 操作所在范围，决定轮询的 URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationScope {
    Global,
    Zone(String),
}

impl ComputeClient {
    pub fn new(api: GoogleApi) -> Self {
        Self::with_base_url(api, COMPUTE_BASE_URL)
    }

    pub fn with_base_url(api: GoogleApi, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn insert_firewall(&self, project: &str, firewall: &Firewall) -> OpsResult<Operation> {
        let url = format!("{}/projects/{}/global/firewalls", self.base_url, project);
        self.api.post(&url, firewall).await
    }

    /// 实例不存在时返回 None
    pub async fn get_instance(&self, project: &str, zone: &str, name: &str) -> OpsResult<Option<Instance>> {
        let url = format!(
            "{}/projects/{}/zones/{}/instances/{}",
            self.base_url, project, zone, name
        );
        match self.api.get(&url, &[]).await {
            Ok(instance) => Ok(Some(instance)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn insert_instance(&self, project: &str, zone: &str, instance: &Instance) -> OpsResult<Operation> {
        let url = format!("{}/projects/{}/zones/{}/instances", self.base_url, project, zone);
        self.api.post(&url, instance).await
    }

    pub async fn get_operation(&self, project: &str, scope: &OperationScope, name: &str) -> OpsResult<Operation> {
        let url = match scope {
            OperationScope::Global => {
                format!("{}/projects/{}/global/operations/{}", self.base_url, project, name)
            }
            OperationScope::Zone(zone) => format!(
                "{}/projects/{}/zones/{}/operations/{}",
                self.base_url, project, zone, name
            ),
        };
        self.api.get(&url, &[]).await
    }
}
