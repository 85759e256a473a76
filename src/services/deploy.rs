//! Cloud Run build-and-deploy workflow
//!
//! Stages: Cloud Build image → `gcloud run deploy` → delayed health probe.
//! A failed deploy or a failed probe triggers a single traffic rollback.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};

use crate::config::DeployConfig;
use crate::domain::deploy::{DeployStage, DeploymentResult, HealthVerdict};
use crate::domain::Severity;
use crate::error::{OpsError, OpsResult};
use crate::infra::command::{CommandExecutor, OutputMode};
use crate::infra::CloudLogger;

/// Exit code when the health probe failed and a rollback was attempted
pub const EXIT_UNHEALTHY: i32 = 2;

/// Returns the first whitespace-delimited token starting with `https://`
pub fn extract_service_url(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .find(|token| token.starts_with("https://"))
        .map(str::to_string)
}

/// One-shot HTTP probe against `<url>/api/health`
pub struct HealthProbe {
    http: reqwest::Client,
    delay: Duration,
}

impl HealthProbe {
    pub fn new(delay: Duration) -> OpsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, delay })
    }

    /// Waits for the configured delay, then expects HTTP 200
    pub async fn check(&self, service_url: &str) -> OpsResult<()> {
        tokio::time::sleep(self.delay).await;

        let url = format!("{}/api/health", service_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| OpsError::HealthCheck(e.to_string()))?;

        if response.status() == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(OpsError::HealthCheck(format!("status {}", response.status().as_u16())))
        }
    }
}

/// Result of a completed (not aborted) workflow run
#[derive(Debug)]
pub struct DeployOutcome {
    pub result: DeploymentResult,
    pub health: HealthVerdict,
    pub stages: Vec<DeployStage>,
}

impl DeployOutcome {
    pub fn exit_code(&self) -> i32 {
        if !self.result.success {
            return 1;
        }
        match self.health {
            HealthVerdict::Healthy | HealthVerdict::Skipped => 0,
            HealthVerdict::Unhealthy { .. } => EXIT_UNHEALTHY,
        }
    }
}

pub struct Deployer<E> {
    config: DeployConfig,
    executor: E,
    probe: HealthProbe,
    logger: CloudLogger,
}

impl<E: CommandExecutor> Deployer<E> {
    pub fn new(config: DeployConfig, executor: E, probe: HealthProbe, logger: CloudLogger) -> Self {
        Self {
            config,
            executor,
            probe,
            logger,
        }
    }

    pub fn build_args(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            "builds".into(),
            "submit".into(),
            "--tag".into(),
            c.image.clone(),
            "--project".into(),
            c.project.project_id.clone(),
            "--quiet".into(),
            c.source_dir.clone(),
        ]
    }

    pub fn deploy_args(&self, image: &str) -> Vec<String> {
        let c = &self.config;
        let mut args: Vec<String> = vec![
            "run".into(),
            "deploy".into(),
            c.service_name.clone(),
            "--image".into(),
            image.to_string(),
            "--region".into(),
            c.project.region.clone(),
            "--platform".into(),
            "managed".into(),
            "--allow-unauthenticated".into(),
            "--memory".into(),
            c.memory.clone(),
            "--cpu".into(),
            c.cpu.clone(),
            "--project".into(),
            c.project.project_id.clone(),
            "--quiet".into(),
        ];
        if let Some(env_vars) = c.env_vars_flag() {
            args.push("--set-env-vars".into());
            args.push(env_vars);
        }
        args
    }

    pub fn rollback_args(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            "run".into(),
            "services".into(),
            "update-traffic".into(),
            c.service_name.clone(),
            "--to-revisions".into(),
            "LATEST=100".into(),
            "--region".into(),
            c.project.region.clone(),
            "--project".into(),
            c.project.project_id.clone(),
        ]
    }

    /// Builds the image with Cloud Build. Any failure is fatal.
    pub async fn build_image(&self) -> OpsResult<String> {
        self.logger.info("Starting Docker image build...");

        let output = self
            .executor
            .run("gcloud", &self.build_args(), OutputMode::Inherit)
            .await
            .map_err(|source| OpsError::Command {
                program: "gcloud".into(),
                source,
            })?;

        if !output.success() {
            self.logger
                .error(&format!("Image build failed with exit code {:?}", output.code));
            return Err(OpsError::CommandExit {
                program: "gcloud builds submit".into(),
                code: output.code,
            });
        }

        self.logger.info(&format!("Image built: {}", self.config.image));
        Ok(self.config.image.clone())
    }

    /// Deploys the image; failures are reported in the returned result
    pub async fn deploy_service(&self, image: &str) -> DeploymentResult {
        self.logger.info("Starting Cloud Run deployment...");

        let output = match self
            .executor
            .run("gcloud", &self.deploy_args(image), OutputMode::Capture)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                self.logger.error(&format!("Deployment failed: {}", e));
                return DeploymentResult::failed(e.to_string());
            }
        };

        if !output.success() {
            self.logger.error(&format!(
                "Deployment failed with exit code {:?}\n{}",
                output.code, output.output
            ));
            return DeploymentResult::failed(output.output);
        }

        let service_url = extract_service_url(&output.output);
        match &service_url {
            Some(url) => self.logger.info(&format!("Service deployed: {}", url)),
            None => self
                .logger
                .warning("Service deployed but no https:// URL found in gcloud output"),
        }
        DeploymentResult::succeeded(service_url, Utc::now())
    }

    pub async fn health_check(&self, service_url: &str) -> OpsResult<()> {
        self.logger.info("Checking service health...");
        match self.probe.check(service_url).await {
            Ok(()) => {
                self.logger.info("Health check passed");
                Ok(())
            }
            Err(e) => {
                self.logger.warning(&format!("Health check failed: {}", e));
                Err(e)
            }
        }
    }

    /// Pins all traffic to the latest revision. Failures are logged, not retried.
    pub async fn rollback(&self) -> OpsResult<()> {
        self.logger.warning("Starting rollback to the previous version...");

        let result = match self
            .executor
            .run("gcloud", &self.rollback_args(), OutputMode::Capture)
            .await
        {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(OpsError::CommandExit {
                program: "gcloud run services update-traffic".into(),
                code: output.code,
            }),
            Err(source) => Err(OpsError::Command {
                program: "gcloud".into(),
                source,
            }),
        };

        match &result {
            Ok(()) => self.logger.info("Rollback completed"),
            Err(e) => self.logger.error(&format!("Rollback failed: {}", e)),
        }
        result
    }

    /// Runs the whole workflow. Only a build failure is returned as `Err`.
    pub async fn run(&self) -> OpsResult<DeployOutcome> {
        let mut stages = vec![
            DeployStage::new("build", "Cloud Build"),
            DeployStage::new("deploy", "Cloud Run Deploy"),
            DeployStage::new("health_check", "Health Check"),
            DeployStage::new("rollback", "Rollback"),
        ];

        // Stage 1: build
        stages[0].start();
        let image = match self.build_image().await {
            Ok(image) => {
                stages[0].finish(true, Some(image.clone()));
                image
            }
            Err(e) => {
                stages[0].finish(false, Some(e.to_string()));
                return Err(e);
            }
        };

        // Stage 2: deploy
        stages[1].start();
        let result = self.deploy_service(&image).await;
        if !result.success {
            stages[1].finish(false, Some("gcloud run deploy failed".to_string()));
            stages[2].skip(Some("deploy failed".to_string()));
            self.run_rollback(&mut stages[3]).await;
            return Ok(DeployOutcome {
                result,
                health: HealthVerdict::Skipped,
                stages,
            });
        }
        stages[1].finish(true, result.service_url.clone());

        // Stage 3: health check
        let health = match result.service_url.as_deref() {
            Some(url) => {
                stages[2].start();
                match self.health_check(url).await {
                    Ok(()) => {
                        stages[2].finish(true, None);
                        stages[3].skip(None);
                        HealthVerdict::Healthy
                    }
                    Err(e) => {
                        stages[2].finish(false, Some(e.to_string()));
                        self.logger
                            .log(Severity::Warning, "Health check failed, starting rollback...");
                        let rolled_back = self.run_rollback(&mut stages[3]).await;
                        HealthVerdict::Unhealthy {
                            reason: e.to_string(),
                            rolled_back,
                        }
                    }
                }
            }
            None => {
                stages[2].skip(Some("no service URL".to_string()));
                stages[3].skip(None);
                HealthVerdict::Skipped
            }
        };

        Ok(DeployOutcome {
            result,
            health,
            stages,
        })
    }

    async fn run_rollback(&self, stage: &mut DeployStage) -> bool {
        stage.start();
        match self.rollback().await {
            Ok(()) => {
                stage.finish(true, None);
                true
            }
            Err(e) => {
                stage.finish(false, Some(e.to_string()));
                false
            }
        }
    }
}

/// Prints the final summary block
pub fn print_summary(outcome: &DeployOutcome) {
    let result = &outcome.result;
    println!();
    println!("================================================");
    if result.success {
        println!("DEPLOYMENT COMPLETED");
    } else {
        println!("DEPLOYMENT FAILED");
    }
    println!("URL:       {}", result.service_url.as_deref().unwrap_or("-"));
    println!("Version:   {}", result.version);
    println!(
        "Timestamp: {}",
        result.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    if let HealthVerdict::Unhealthy { reason, rolled_back } = &outcome.health {
        println!("Health:    FAILED ({}), rollback {}", reason, if *rolled_back { "done" } else { "failed" });
    }
    println!();
    for stage in &outcome.stages {
        println!(
            "  {:<18} {:<8} {}",
            stage.display_name,
            stage.status.as_str(),
            stage
                .duration_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_default()
        );
    }
    println!("================================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::testing::lookup_from;
    use crate::domain::StageStatus;
    use crate::infra::command::{CommandError, CommandOutput};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outputs and records every invocation
    #[derive(Default)]
    struct ScriptedExecutor {
        responses: Mutex<VecDeque<CommandOutput>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedExecutor {
        fn with(responses: Vec<(i32, &str)>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|(code, out)| CommandOutput {
                            code: Some(code),
                            output: out.to_string(),
                        })
                        .collect(),
                ),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<'a> CommandExecutor for &'a ScriptedExecutor {
        async fn run(
            &self,
            _program: &str,
            args: &[String],
            _mode: OutputMode,
        ) -> Result<CommandOutput, CommandError> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn deployer(executor: &ScriptedExecutor) -> Deployer<&ScriptedExecutor> {
        let config = DeployConfig::from_lookup(&lookup_from(&[
            ("GCP_PROJECT_ID", "demo"),
            ("DB_HOST", "10.1.2.3"),
        ]));
        let probe = HealthProbe::new(Duration::ZERO).unwrap();
        Deployer::new(config, executor, probe, CloudLogger::console("test"))
    }

    #[test]
    fn test_extract_first_https_token() {
        let output = "Deploying container...\n\
                      Done.\n\
                      Service [api] revision [api-0001] has been deployed.\n\
                      Service URL: https://api-abc-uc.a.run.app\n\
                      Also see https://console.cloud.google.com";
        assert_eq!(
            extract_service_url(output).as_deref(),
            Some("https://api-abc-uc.a.run.app")
        );
    }

    #[test]
    fn test_extract_requires_prefix() {
        assert_eq!(extract_service_url("see (https://x) or http://y"), None);
        assert_eq!(extract_service_url(""), None);
    }

    #[test]
    fn test_deploy_args() {
        let executor = ScriptedExecutor::default();
        let d = deployer(&executor);
        let args = d.deploy_args("gcr.io/demo/serenvoice-backend:latest");
        assert_eq!(&args[..3], &["run", "deploy", "serenvoice-backend"]);
        assert!(args.contains(&"--allow-unauthenticated".to_string()));
        assert_eq!(
            args[args.len() - 2..],
            ["--set-env-vars".to_string(), "DB_HOST=10.1.2.3,FLASK_ENV=production".to_string()]
        );
    }

    #[tokio::test]
    async fn test_build_failure_is_fatal() {
        let executor = ScriptedExecutor::with(vec![(1, "")]);
        let err = deployer(&executor).run().await.unwrap_err();

        assert!(matches!(err, OpsError::CommandExit { code: Some(1), .. }));
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_deploy_failure_rolls_back_once() {
        let executor = ScriptedExecutor::with(vec![(0, ""), (1, "ERROR: permission denied"), (0, "")]);
        let outcome = deployer(&executor).run().await.unwrap();

        assert!(!outcome.result.success);
        assert_eq!(outcome.result.message, "ERROR: permission denied");
        assert_eq!(outcome.exit_code(), 1);

        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(&calls[2][..3], &["run", "services", "update-traffic"]);
        assert!(calls[2].contains(&"LATEST=100".to_string()));
        assert_eq!(outcome.stages[3].status, StageStatus::Success);
    }

    #[tokio::test]
    async fn test_no_url_skips_health_check() {
        let executor = ScriptedExecutor::with(vec![(0, ""), (0, "Done.")]);
        let outcome = deployer(&executor).run().await.unwrap();

        assert_eq!(outcome.health, HealthVerdict::Skipped);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(executor.calls().len(), 2);
        assert!(!outcome.result.version.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_triggers_rollback() {
        // 端口 1 上没有服务，请求立即失败
        let executor = ScriptedExecutor::with(vec![
            (0, ""),
            (0, "Service URL: https://127.0.0.1:1"),
            (1, "rollback broke"),
        ]);
        let outcome = deployer(&executor).run().await.unwrap();

        match &outcome.health {
            HealthVerdict::Unhealthy { rolled_back, .. } => assert!(!rolled_back),
            other => panic!("unexpected verdict: {:?}", other),
        }
        assert_eq!(outcome.exit_code(), EXIT_UNHEALTHY);
        assert_eq!(executor.calls().len(), 3);
        assert_eq!(outcome.stages[3].status, StageStatus::Failed);
    }

    #[tokio::test]
    async fn test_probe_accepts_only_200() {
        use crate::infra::google::testing::serve;
        use axum::{http::StatusCode, routing::get, Router};

        let ok = serve(Router::new().route("/api/health", get(|| async { "ok" }))).await;
        let probe = HealthProbe::new(Duration::ZERO).unwrap();
        assert!(probe.check(&ok).await.is_ok());

        let accepted = serve(Router::new().route(
            "/api/health",
            get(|| async { (StatusCode::ACCEPTED, "warming up") }),
        ))
        .await;
        let err = probe.check(&accepted).await.unwrap_err();
        assert!(err.to_string().contains("202"));
    }
}
