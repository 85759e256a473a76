//! Cloud Monitoring v3 客户端

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::domain::resource::MetricPoint;
use crate::error::OpsResult;
use crate::infra::google::GoogleApi;

const MONITORING_BASE_URL: &str = "https://monitoring.googleapis.com/v3";

#[derive(Clone)]
pub struct MonitoringClient {
    api: GoogleApi,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<TimeSeries>,
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct TimeSeries {
    #[serde(default)]
    metric: Metric,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    points: Vec<Point>,
}

#[derive(Debug, Default, Deserialize)]
struct Metric {
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
struct Point {
    #[serde(default)]
    interval: Option<PointInterval>,
    #[serde(default)]
    value: TypedValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointInterval {
    end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedValue {
    double_value: Option<f64>,
    /// int64 在 JSON 中以字符串表示
    int64_value: Option<String>,
}

impl TypedValue {
    fn as_f64(&self) -> f64 {
        if let Some(v) = self.double_value {
            return v;
        }
        self.int64_value
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v as f64)
            .unwrap_or(0.0)
    }
}

impl TimeSeries {
    /// 取第一个点（API 按时间倒序返回，即最新值）
    fn into_metric_point(self, fallback: DateTime<Utc>) -> MetricPoint {
        let first = self.points.first();
        MetricPoint {
            name: self.metric.kind,
            value: first.map(|p| p.value.as_f64()).unwrap_or(0.0),
            unit: self.unit,
            timestamp: first
                .and_then(|p| p.interval.as_ref())
                .and_then(|i| i.end_time)
                .unwrap_or(fallback),
        }
    }
}

/// Cloud Run revision 的过滤条件
pub fn service_filter(service: &str) -> String {
    format!(
        r#"resource.type="cloud_run_revision" AND resource.labels.service_name="{}""#,
        service
    )
}

impl MonitoringClient {
    pub fn new(api: GoogleApi) -> Self {
        Self::with_base_url(api, MONITORING_BASE_URL)
    }

    pub fn with_base_url(api: GoogleApi, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 列出区间内匹配过滤条件的时间序列，每个序列取一个点
    pub async fn list_time_series(
        &self,
        project: &str,
        filter: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OpsResult<Vec<MetricPoint>> {
        let url = format!("{}/projects/{}/timeSeries", self.base_url, project);
        let mut points = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut query = vec![
                ("filter", filter.to_string()),
                ("interval.startTime", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("interval.endTime", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ];
            if !page_token.is_empty() {
                query.push(("pageToken", page_token.clone()));
            }

            let page: ListTimeSeriesResponse = self.api.get(&url, &query).await?;
            points.extend(page.time_series.into_iter().map(|ts| ts.into_metric_point(end)));

            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }

        Ok(points)
    }
}
