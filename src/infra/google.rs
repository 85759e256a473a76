//! Google Cloud REST 基础客户端
//!
//! 封装鉴权头、超时和错误状态码映射，复用连接池

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{OpsError, OpsResult};
use crate::infra::auth::TokenProvider;

#[derive(Clone)]
pub struct GoogleApi {
    http: Client,
    tokens: Arc<TokenProvider>,
}

impl GoogleApi {
    pub fn new(tokens: Arc<TokenProvider>) -> OpsResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { http, tokens })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> OpsResult<T> {
        let request = self.http.get(url).query(query);
        self.send(Method::GET, url, request).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> OpsResult<T> {
        let request = self.http.post(url).json(body);
        self.send(Method::POST, url, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        request: RequestBuilder,
    ) -> OpsResult<T> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();

        debug!(method = %method, url, status = %status, "Google API call");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpsError::GoogleApi {
                method: method_name(&method),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        // entries:write 等接口返回空对象
        if bytes.is_empty() {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn method_name(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PATCH => "PATCH",
        Method::DELETE => "DELETE",
        _ => "HTTP",
    }
}
