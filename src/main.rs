//! SerenVoice Ops - SerenVoice 部署与运维工具
//!
//! Usage:
//! - Deploy backend to Cloud Run: `serenvoice-ops deploy`
//! - Create firewall rule and VM: `serenvoice-ops provision`
//! - Export Cloud Run resources: `serenvoice-ops inspect --output resources_export.json`
//! - Run webhook handlers: `serenvoice-ops serve --port 8080`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use serenvoice_ops::api;
use serenvoice_ops::config::env::{cloud_logging_enabled, constants, process_env};
use serenvoice_ops::config::{DeployConfig, FunctionConfig, GcpProject, VmConfig};
use serenvoice_ops::domain::MetricsWindow;
use serenvoice_ops::infra::{
    CloudLogger, CloudRunClient, CommandRunner, ComputeClient, GoogleApi, LogFlusher,
    LoggingClient, MonitoringClient, TokenProvider,
};
use serenvoice_ops::services::deploy::{self, HealthProbe};
use serenvoice_ops::services::inspect;
use serenvoice_ops::services::provision::{self, ProvisionTimings};
use serenvoice_ops::services::{Deployer, Provisioner, ResourceManager};
use serenvoice_ops::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "serenvoice-ops", version, about = "SerenVoice 部署与运维工具", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 构建镜像并发布到 Cloud Run，健康检查失败时回滚
    Deploy,
    /// 创建防火墙规则和带启动脚本的 VM
    Provision,
    /// 列出 Cloud Run 服务、读取指标并导出 JSON
    Inspect {
        /// 导出文件路径
        #[arg(short, long, default_value = constants::DEFAULT_EXPORT_FILE)]
        output: PathBuf,

        /// 指标时间窗口：last-hour 或 all
        #[arg(long, default_value = "last-hour")]
        metrics_window: MetricsWindow,
    },
    /// 启动 webhook HTTP 服务
    Serve {
        /// 监听端口，未指定时为 8080
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let tokens = Arc::new(TokenProvider::from_env());

    let code = match cli.command {
        Command::Deploy => run_deploy(&tokens).await,
        Command::Provision => run_provision(&tokens).await,
        Command::Inspect {
            output,
            metrics_window,
        } => run_inspect(&tokens, output, metrics_window).await,
        Command::Serve { port } => run_serve(&tokens, port).await,
    };

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// 创建日志句柄。关闭 Cloud Logging 或客户端初始化失败时只输出到控制台
fn start_logger(
    log_id: &str,
    project: &GcpProject,
    tokens: &Arc<TokenProvider>,
) -> (CloudLogger, LogFlusher) {
    if !cloud_logging_enabled(&process_env) {
        return CloudLogger::start(log_id, None);
    }

    let client = match GoogleApi::new(tokens.clone()) {
        Ok(api) => Some(LoggingClient::new(api, &project.project_id, log_id)),
        Err(e) => {
            warn!(error = %e, "Cloud Logging unavailable, logging to console only");
            None
        }
    };
    CloudLogger::start(log_id, client)
}

async fn run_deploy(tokens: &Arc<TokenProvider>) -> i32 {
    let config = DeployConfig::from_env();
    let (logger, flusher) = start_logger("serenvoice-deploy", &config.project, tokens);

    info!(
        project = %config.project.project_id,
        service = %config.service_name,
        image = %config.image,
        "Starting deployment"
    );

    let code = match HealthProbe::new(Duration::from_secs(constants::HEALTH_CHECK_DELAY_SECS)) {
        Ok(probe) => {
            let deployer = Deployer::new(config, CommandRunner::default(), probe, logger);
            match deployer.run().await {
                Ok(outcome) => {
                    deploy::print_summary(&outcome);
                    outcome.exit_code()
                }
                Err(e) => {
                    error!(error = %e, "Deployment aborted");
                    1
                }
            }
        }
        Err(e) => {
            logger.error(&format!("Failed to build HTTP client: {}", e));
            drop(logger);
            1
        }
    };

    flusher.shutdown().await;
    code
}

async fn run_provision(tokens: &Arc<TokenProvider>) -> i32 {
    let config = VmConfig::from_env();
    let (logger, flusher) = start_logger("serenvoice-vm", &config.project, tokens);

    info!(
        project = %config.project.project_id,
        zone = %config.zone,
        vm = %config.vm_name,
        "Starting VM provisioning"
    );

    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });

    let code = match GoogleApi::new(tokens.clone()) {
        Ok(api) => {
            let provisioner = Provisioner::new(
                config.clone(),
                ComputeClient::new(api),
                logger,
                ProvisionTimings::default(),
                cancel,
            );
            match provisioner.run().await {
                Ok(report) => {
                    provision::print_summary(&config, &report);
                    0
                }
                Err(e) => {
                    error!(error = %e, "Provisioning failed");
                    1
                }
            }
        }
        Err(e) => {
            logger.error(&format!("Failed to build Compute client: {}", e));
            drop(logger);
            1
        }
    };

    flusher.shutdown().await;
    code
}

async fn run_inspect(tokens: &Arc<TokenProvider>, output: PathBuf, window: MetricsWindow) -> i32 {
    let project = GcpProject::from_env();
    let (logger, flusher) = start_logger("serenvoice-resources", &project, tokens);

    let code = match GoogleApi::new(tokens.clone()) {
        Ok(api) => {
            let manager = ResourceManager::new(
                project.project_id.clone(),
                project.region.clone(),
                CloudRunClient::new(api.clone()),
                MonitoringClient::new(api),
                logger,
            )
            .with_window(window);

            match manager.export(&output).await {
                Ok(export) => {
                    inspect::print_services(&export.services);
                    println!();
                    println!("Exported to {}", output.display());
                    0
                }
                Err(e) => {
                    error!(error = %e, path = %output.display(), "Export failed");
                    1
                }
            }
        }
        Err(e) => {
            logger.error(&format!("Failed to build API client: {}", e));
            drop(logger);
            1
        }
    };

    flusher.shutdown().await;
    code
}

async fn run_serve(tokens: &Arc<TokenProvider>, port: Option<u16>) -> i32 {
    let config = FunctionConfig::from_env();
    let port = port.unwrap_or(config.port);
    let (logger, flusher) = start_logger("serenvoice-functions", &config.project, tokens);

    let state = Arc::new(AppState::new(logger, config.deployment));
    let code = serve(api::router(state), port).await;

    flusher.shutdown().await;
    code
}

async fn serve(app: axum::Router, port: u16) -> i32 {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "Failed to bind");
            return 1;
        }
    };

    info!(%addr, "Webhook server listening");
    match axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        Ok(()) => {
            info!("Webhook server stopped");
            0
        }
        Err(e) => {
            error!(error = %e, "Server error");
            1
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
