//! 资源快照领域模型

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cloud Run 服务状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceStatus {
    pub name: String,
    pub url: String,
    /// 第一个 condition 的状态（"True" / "False" / "Unknown"）
    pub status: String,
    /// 第一个流量目标的 revision
    pub revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 指标数据点
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// 导出文件内容
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceExport {
    pub project_id: String,
    pub region: String,
    pub services: Vec<ServiceStatus>,
    /// service name -> metrics
    #[serde(default)]
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    pub exported_at: DateTime<Utc>,
}

/// 指标查询时间窗口
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MetricsWindow {
    /// 最近一小时
    #[default]
    LastHour,
    /// 不限制起点（从 Unix 纪元开始）
    All,
}

impl MetricsWindow {
    /// 返回 (start, end)
    pub fn interval(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            MetricsWindow::LastHour => (now - Duration::hours(1), now),
            // DateTime<Utc> 的默认值即 Unix 纪元
            MetricsWindow::All => (DateTime::<Utc>::default(), now),
        }
    }
}

impl std::str::FromStr for MetricsWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-hour" | "1h" => Ok(MetricsWindow::LastHour),
            "all" => Ok(MetricsWindow::All),
            other => Err(format!("unknown metrics window: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_last_hour_interval() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let (start, end) = MetricsWindow::LastHour.interval(now);
        assert_eq!(end, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_window_parse() {
        assert_eq!("all".parse::<MetricsWindow>(), Ok(MetricsWindow::All));
        assert_eq!("1h".parse::<MetricsWindow>(), Ok(MetricsWindow::LastHour));
        assert!("week".parse::<MetricsWindow>().is_err());
    }

    #[test]
    fn test_export_serializes_empty_services() {
        let export = ResourceExport {
            project_id: "p".into(),
            region: "r".into(),
            services: Vec::new(),
            metrics: BTreeMap::new(),
            exported_at: Utc::now(),
        };
        let value = serde_json::to_value(&export).unwrap();
        assert_eq!(value["services"], serde_json::json!([]));
        assert!(value.get("exported_at").is_some());
    }
}
