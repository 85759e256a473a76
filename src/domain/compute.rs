//! Compute Engine REST 资源（只包含用到的字段）

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Firewall {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub network: String,
    #[serde(default)]
    pub allowed: Vec<Allowed>,
    #[serde(default)]
    pub source_ranges: Vec<String>,
    #[serde(default)]
    pub target_tags: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Allowed {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub machine_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub disks: Vec<AttachedDisk>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub service_accounts: Vec<ServiceAccount>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Instance {
    /// 第一个带 natIP 的 access config
    pub fn external_ip(&self) -> Option<&str> {
        self.network_interfaces
            .iter()
            .flat_map(|ni| ni.access_configs.iter())
            .find_map(|ac| ac.nat_ip.as_deref())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    #[serde(default)]
    pub boot: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_params: Option<InitializeParams>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// int64 在 JSON 中以字符串表示
    pub disk_size_gb: String,
    pub source_image: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_tier: Option<String>,
    #[serde(default, rename = "natIP", skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub email: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// 长时间运行的操作
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    /// PENDING / RUNNING / DONE
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    /// 操作以错误结束时的描述
    pub fn error_message(&self) -> Option<String> {
        let errors = &self.error.as_ref()?.errors;
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_external_ip_first_nat() {
        let instance: Instance = serde_json::from_value(json!({
            "name": "vm",
            "networkInterfaces": [
                { "accessConfigs": [] },
                { "accessConfigs": [
                    { "name": "External NAT" },
                    { "name": "External NAT 2", "natIP": "34.10.0.7" }
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(instance.external_ip(), Some("34.10.0.7"));
    }

    #[test]
    fn test_no_external_ip() {
        let instance = Instance {
            name: "vm".into(),
            ..Default::default()
        };
        assert_eq!(instance.external_ip(), None);
    }

    #[test]
    fn test_firewall_wire_names() {
        let fw = Firewall {
            name: "fw".into(),
            network: "n".into(),
            allowed: vec![Allowed {
                ip_protocol: "tcp".into(),
                ports: vec!["80".into()],
            }],
            source_ranges: vec!["0.0.0.0/0".into()],
            ..Default::default()
        };
        let value = serde_json::to_value(&fw).unwrap();
        assert_eq!(value["allowed"][0]["IPProtocol"], "tcp");
        assert_eq!(value["sourceRanges"][0], "0.0.0.0/0");
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_operation_error_message() {
        let op: Operation = serde_json::from_value(json!({
            "name": "op-1",
            "status": "DONE",
            "error": { "errors": [{ "code": "QUOTA_EXCEEDED", "message": "CPUS" }] }
        }))
        .unwrap();
        assert!(op.is_done());
        assert_eq!(op.error_message().as_deref(), Some("QUOTA_EXCEEDED: CPUS"));
    }
}
