//! Compute Engine VM 创建流程
//!
//! 1. 创建防火墙规则（尽力而为，已存在只记警告）
//! 2. VM 已存在则跳过，否则带启动脚本创建并轮询操作直到完成
//! 3. 等待片刻后读取外部 IP（读不到不影响整体结果）

use std::io::Write;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::env::constants::{
    EXTERNAL_IP_DELAY_SECS, GLOBAL_OPERATION_POLL_SECS, ZONE_OPERATION_POLL_SECS,
};
use crate::config::VmConfig;
use crate::domain::compute::{
    AccessConfig, Allowed, AttachedDisk, Firewall, InitializeParams, Instance, Metadata,
    MetadataItem, NetworkInterface, Operation, ServiceAccount, Tags,
};
use crate::error::{OpsError, OpsResult};
use crate::infra::compute::OperationScope;
use crate::infra::{CloudLogger, ComputeClient};
use crate::services::policy::StepResultExt;

/// 随实例元数据下发的启动脚本
pub const STARTUP_SCRIPT: &str = include_str!("startup-script.sh");

const SERVICE_ACCOUNT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/logging.write",
    "https://www.googleapis.com/auth/monitoring.write",
];

/// 等待与轮询间隔
#[derive(Clone, Debug)]
pub struct ProvisionTimings {
    pub global_poll: Duration,
    pub zone_poll: Duration,
    pub external_ip_delay: Duration,
}

impl Default for ProvisionTimings {
    fn default() -> Self {
        Self {
            global_poll: Duration::from_secs(GLOBAL_OPERATION_POLL_SECS),
            zone_poll: Duration::from_secs(ZONE_OPERATION_POLL_SECS),
            external_ip_delay: Duration::from_secs(EXTERNAL_IP_DELAY_SECS),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstanceState {
    Created,
    AlreadyExists,
}

#[derive(Clone, Debug)]
pub struct ProvisionReport {
    pub firewall_created: bool,
    pub instance: InstanceState,
    pub external_ip: Option<String>,
}

pub struct Provisioner {
    config: VmConfig,
    compute: ComputeClient,
    logger: CloudLogger,
    timings: ProvisionTimings,
    cancel: CancellationToken,
}

impl Provisioner {
    pub fn new(
        config: VmConfig,
        compute: ComputeClient,
        logger: CloudLogger,
        timings: ProvisionTimings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            compute,
            logger,
            timings,
            cancel,
        }
    }

    fn project(&self) -> &str {
        &self.config.project.project_id
    }

    pub fn firewall_rule(&self) -> Firewall {
        let fw = &self.config.firewall;
        Firewall {
            name: fw.name.clone(),
            description: "Allow HTTP/HTTPS and app ports for SerenVoice".to_string(),
            network: self.config.network_uri(),
            allowed: vec![Allowed {
                ip_protocol: "tcp".to_string(),
                ports: fw.ports.clone(),
            }],
            source_ranges: fw.source_ranges.clone(),
            target_tags: vec![fw.target_tag.clone()],
        }
    }

    pub fn instance_resource(&self) -> Instance {
        let c = &self.config;
        Instance {
            name: c.vm_name.clone(),
            machine_type: c.machine_type_uri(),
            status: None,
            disks: vec![AttachedDisk {
                boot: true,
                auto_delete: true,
                initialize_params: Some(InitializeParams {
                    disk_size_gb: c.disk_size_gb.to_string(),
                    source_image: c.source_image_uri(),
                }),
            }],
            network_interfaces: vec![NetworkInterface {
                network: Some("global/networks/default".to_string()),
                access_configs: vec![AccessConfig {
                    name: "External NAT".to_string(),
                    network_tier: Some("STANDARD".to_string()),
                    nat_ip: None,
                }],
            }],
            tags: Some(Tags {
                items: c.network_tags.clone(),
            }),
            metadata: Some(Metadata {
                items: vec![
                    MetadataItem {
                        key: "startup-script".to_string(),
                        value: STARTUP_SCRIPT.to_string(),
                    },
                    MetadataItem {
                        key: "app-repo".to_string(),
                        value: c.app_repo_url.clone(),
                    },
                ],
            }),
            service_accounts: vec![ServiceAccount {
                email: "default".to_string(),
                scopes: SERVICE_ACCOUNT_SCOPES.iter().map(|s| s.to_string()).collect(),
            }],
            labels: [("app", "serenvoice"), ("environment", "production")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// 创建防火墙规则并等待完成
    pub async fn ensure_firewall(&self) -> OpsResult<()> {
        let op = self
            .compute
            .insert_firewall(self.project(), &self.firewall_rule())
            .await?;
        self.wait_for_operation(op, &OperationScope::Global, self.timings.global_poll, false)
            .await?;

        self.logger.info("Firewall rules created");
        Ok(())
    }

    /// VM 已存在时直接返回，不做任何更新
    pub async fn ensure_instance(&self) -> OpsResult<InstanceState> {
        let c = &self.config;
        if self
            .compute
            .get_instance(self.project(), &c.zone, &c.vm_name)
            .await?
            .is_some()
        {
            self.logger
                .warning(&format!("VM {} already exists, skipping creation", c.vm_name));
            return Ok(InstanceState::AlreadyExists);
        }

        self.logger.info(&format!("Creating VM {}...", c.vm_name));
        let op = self
            .compute
            .insert_instance(self.project(), &c.zone, &self.instance_resource())
            .await?;
        self.wait_for_operation(
            op,
            &OperationScope::Zone(c.zone.clone()),
            self.timings.zone_poll,
            true,
        )
        .await?;

        self.logger.info("VM created successfully");
        Ok(InstanceState::Created)
    }

    /// 轮询直到 DONE，无超时；只能通过取消令牌中断
    pub async fn wait_for_operation(
        &self,
        mut op: Operation,
        scope: &OperationScope,
        interval: Duration,
        show_progress: bool,
    ) -> OpsResult<Operation> {
        while !op.is_done() {
            if show_progress {
                print!(".");
                let _ = std::io::stdout().flush();
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(OpsError::Cancelled { step: format!("operation {}", op.name) });
                }
                _ = tokio::time::sleep(interval) => {}
            }

            op = self.compute.get_operation(self.project(), scope, &op.name).await?;
        }
        if show_progress {
            println!();
        }

        match op.error_message() {
            Some(message) => Err(OpsError::Operation {
                name: op.name,
                message,
            }),
            None => Ok(op),
        }
    }

    /// 读取实例的第一个外部 IP
    pub async fn external_ip(&self) -> OpsResult<String> {
        tokio::time::sleep(self.timings.external_ip_delay).await;

        let c = &self.config;
        let instance = self
            .compute
            .get_instance(self.project(), &c.zone, &c.vm_name)
            .await?
            .ok_or_else(|| OpsError::NoExternalIp(c.vm_name.clone()))?;

        instance
            .external_ip()
            .map(str::to_string)
            .ok_or_else(|| OpsError::NoExternalIp(c.vm_name.clone()))
    }

    pub async fn run(&self) -> OpsResult<ProvisionReport> {
        let firewall_created = self
            .ensure_firewall()
            .await
            .or_degrade("firewall rule (may already exist)", &self.logger)
            .is_some();

        let instance = self.ensure_instance().await.or_abort("create VM", &self.logger)?;

        let external_ip = self
            .external_ip()
            .await
            .or_degrade("external IP lookup", &self.logger);

        Ok(ProvisionReport {
            firewall_created,
            instance,
            external_ip,
        })
    }
}

pub fn print_summary(config: &VmConfig, report: &ProvisionReport) {
    println!();
    println!("Provisioning completed");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if let Some(ip) = &report.external_ip {
        println!("Frontend:   http://{}:5173", ip);
        println!("Backend:    http://{}:5000", ip);
        println!("phpMyAdmin: http://{}:8080", ip);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("To connect over SSH:");
    println!("   gcloud compute ssh {} --zone {}", config.vm_name, config.zone);
}
