//! OAuth 访问令牌
//!
//! 来源优先级：
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN` 环境变量
//! 2. 运行在 GCP 内（`K_SERVICE` / `FUNCTION_TARGET`）时使用元数据服务器
//! 3. `gcloud auth print-access-token`

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::env::{get_opt, process_env, Lookup};
use crate::error::{OpsError, OpsResult};
use crate::infra::command::{CommandExecutor, CommandRunner, OutputMode};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// gcloud 令牌不返回有效期，按 50 分钟缓存
const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// 提前刷新的余量
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenSource {
    Static(String),
    MetadataServer,
    Gcloud,
}

impl TokenSource {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        if let Some(token) = get_opt(lookup, "GOOGLE_OAUTH_ACCESS_TOKEN") {
            return TokenSource::Static(token);
        }
        if get_opt(lookup, "K_SERVICE").is_some() || get_opt(lookup, "FUNCTION_TARGET").is_some() {
            return TokenSource::MetadataServer;
        }
        TokenSource::Gcloud
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// 访问令牌提供者（带缓存）
pub struct TokenProvider {
    source: TokenSource,
    http: reqwest::Client,
    runner: CommandRunner,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            http: reqwest::Client::new(),
            runner: CommandRunner::new(Duration::from_secs(30)),
            cache: RwLock::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(TokenSource::from_lookup(&process_env))
    }

    /// 获取有效令牌
    pub async fn token(&self) -> OpsResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if Instant::now() + EXPIRY_MARGIN < cached.expires_at {
                    return Ok(cached.value.clone());
                }
            }
        }

        let (value, ttl) = match &self.source {
            TokenSource::MetadataServer => self.fetch_from_metadata().await?,
            TokenSource::Gcloud => self.fetch_from_gcloud().await?,
            TokenSource::Static(token) => return Ok(token.clone()),
        };

        debug!(source = ?self.source, ttl_secs = ttl.as_secs(), "Refreshed access token");
        *self.cache.write().await = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(value)
    }

    async fn fetch_from_metadata(&self) -> OpsResult<(String, Duration)> {
        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OpsError::Auth(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: MetadataToken = response.json().await?;
        Ok((token.access_token, Duration::from_secs(token.expires_in)))
    }

    async fn fetch_from_gcloud(&self) -> OpsResult<(String, Duration)> {
        let args = vec!["auth".to_string(), "print-access-token".to_string()];
        let output = self
            .runner
            .run("gcloud", &args, OutputMode::Capture)
            .await
            .map_err(|e| OpsError::Auth(e.to_string()))?;

        if !output.success() {
            return Err(OpsError::Auth(format!(
                "gcloud auth print-access-token exited with {:?}: {}",
                output.code,
                output.output.trim()
            )));
        }

        let token = output
            .output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| OpsError::Auth("gcloud printed an empty token".to_string()))?;

        Ok((token.to_string(), GCLOUD_TOKEN_TTL))
    }
}
