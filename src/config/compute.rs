//! Compute Engine VM 配置

use super::env::{constants, get_or, process_env, GcpProject, Lookup};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    pub project: GcpProject,
    pub zone: String,
    pub vm_name: String,
    pub machine_type: String,
    pub disk_size_gb: i64,
    pub image_family: String,
    pub image_project: String,
    pub network_tags: Vec<String>,
    /// 启动脚本克隆的仓库，通过实例元数据 `app-repo` 传入
    pub app_repo_url: String,
    pub firewall: FirewallConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirewallConfig {
    pub name: String,
    pub ports: Vec<String>,
    pub source_ranges: Vec<String>,
    pub target_tag: String,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            name: "serenvoice-allow-web".to_string(),
            ports: ["80", "443", "5000", "5173", "8080", "3306"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            source_ranges: vec!["0.0.0.0/0".to_string()],
            target_tag: "serenvoice".to_string(),
        }
    }
}

impl VmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            project: GcpProject::from_lookup(lookup),
            zone: get_or(lookup, "GCP_ZONE", constants::DEFAULT_ZONE),
            vm_name: get_or(lookup, "VM_NAME", "serenvoice-server"),
            machine_type: get_or(lookup, "VM_MACHINE_TYPE", "e2-medium"),
            disk_size_gb: 30,
            image_family: "ubuntu-2204-lts".to_string(),
            image_project: "ubuntu-os-cloud".to_string(),
            network_tags: vec![
                "http-server".to_string(),
                "https-server".to_string(),
                "serenvoice".to_string(),
            ],
            app_repo_url: get_or(
                lookup,
                "APP_REPO_URL",
                "https://github.com/JohnMejiaDuran/SerenVoice-Analisi-de-Voz.git",
            ),
            firewall: FirewallConfig::default(),
        }
    }

    /// `zones/<zone>/machineTypes/<type>`
    pub fn machine_type_uri(&self) -> String {
        format!("zones/{}/machineTypes/{}", self.zone, self.machine_type)
    }

    /// `projects/<image_project>/global/images/family/<family>`
    pub fn source_image_uri(&self) -> String {
        format!(
            "projects/{}/global/images/family/{}",
            self.image_project, self.image_family
        )
    }

    /// `projects/<project>/global/networks/default`
    pub fn network_uri(&self) -> String {
        format!("projects/{}/global/networks/default", self.project.project_id)
    }
}
