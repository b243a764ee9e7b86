//! CPU readings from a Prometheus-compatible query API
//!
//! The controller must keep running while metrics are unavailable, so the
//! public contract returns `None` instead of failing. `try_query` keeps the
//! reason for logs and tests.

use crate::error::MetricsError;
use crate::models::WorkloadTarget;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Source of scalar metric values
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Evaluate an aggregation expression, `None` when no usable value exists
    async fn query(&self, expression: &str) -> Option<f64>;
}

/// Expression for the workload's CPU usage in cores
pub fn cpu_query(target: &WorkloadTarget, rate_window: &str) -> String {
    format!(
        "sum(rate(container_cpu_usage_seconds_total{{namespace=\"{}\", pod=~\"{}.*\"}}[{}]))",
        target.namespace, target.name, rate_window
    )
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Sample>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    /// `[unix_timestamp, "value"]`
    value: (serde_json::Value, String),
}

/// HTTP client for `GET /api/v1/query`
pub struct PrometheusClient {
    client: Client,
    query_url: Url,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create metrics HTTP client")?;

        let mut base = Url::parse(base_url).context("Invalid metrics URL")?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let query_url = base.join("api/v1/query").context("Invalid metrics URL")?;

        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    /// Run a query and return the first sample's value
    pub async fn try_query(&self, expression: &str) -> Result<f64, MetricsError> {
        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", expression)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MetricsError::Status(response.status().as_u16()));
        }

        let body: QueryResponse = response.json().await?;
        if body.status != "success" {
            return Err(MetricsError::QueryFailed(body.status));
        }

        let raw = body
            .data
            .and_then(|d| d.result.into_iter().next())
            .map(|s| s.value.1)
            .ok_or(MetricsError::EmptyResult)?;

        parse_sample(&raw)
    }
}

fn parse_sample(raw: &str) -> Result<f64, MetricsError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(MetricsError::NotNumeric(raw.to_string())),
    }
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    async fn query(&self, expression: &str) -> Option<f64> {
        match self.try_query(expression).await {
            Ok(value) => {
                debug!(value, "Metrics query succeeded");
                Some(value)
            }
            Err(e) => {
                warn!(error = %e, query = %expression, "Metrics unavailable");
                None
            }
        }
    }
}
