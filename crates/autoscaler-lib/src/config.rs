//! Autoscaler configuration
//!
//! Read from `AUTOSCALER_*` environment variables, e.g.
//! `AUTOSCALER_MAX_REPLICAS=20`.

use crate::error::ConfigError;
use crate::models::{Bounds, WorkloadTarget};
use crate::oracle::OracleConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscalerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Minimum time between two actuations
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,

    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,

    #[serde(default = "default_namespace")]
    pub target_namespace: String,

    #[serde(default = "default_deployment")]
    pub target_deployment: String,

    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    /// Range window of the CPU rate query
    #[serde(default = "default_rate_window")]
    pub cpu_rate_window: String,

    #[serde(default = "default_metrics_timeout")]
    pub metrics_timeout_secs: u64,

    pub oracle_url: Option<String>,

    #[serde(default = "default_model")]
    pub oracle_model: String,

    pub oracle_api_key: Option<String>,

    /// Optional `anthropic-version` header value
    pub oracle_api_version: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub oracle_max_tokens: u32,

    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,

    /// Pod template annotation written to trigger a rollout
    #[serde(default = "default_restart_annotation")]
    pub restart_annotation: String,

    /// Health/metrics server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_cooldown() -> u64 {
    120
}

fn default_min_replicas() -> u32 {
    1
}

fn default_max_replicas() -> u32 {
    10
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_deployment() -> String {
    "sample-app".to_string()
}

fn default_prometheus_url() -> String {
    "http://prometheus-operated.monitoring.svc.cluster.local:9090".to_string()
}

fn default_rate_window() -> String {
    "1m".to_string()
}

fn default_metrics_timeout() -> u64 {
    8
}

fn default_model() -> String {
    "claude-3-5-sonnet".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_oracle_timeout() -> u64 {
    20
}

fn default_restart_annotation() -> String {
    "ai-restart-ts".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl AutoscalerConfig {
    /// Load from the process environment and validate
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("AUTOSCALER"))
    }

    /// Load from an explicit environment source (used by tests)
    pub fn from_source(source: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("Invalid autoscaler configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds()?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("poll_interval_secs"));
        }
        if self.metrics_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("metrics_timeout_secs"));
        }
        if self.oracle_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("oracle_timeout_secs"));
        }
        url::Url::parse(&self.prometheus_url).map_err(|source| ConfigError::InvalidUrl {
            field: "prometheus_url",
            source,
        })?;
        if let Some(oracle_url) = &self.oracle_url {
            url::Url::parse(oracle_url).map_err(|source| ConfigError::InvalidUrl {
                field: "oracle_url",
                source,
            })?;
        }
        Ok(())
    }

    pub fn bounds(&self) -> Result<Bounds, ConfigError> {
        Bounds::new(self.min_replicas, self.max_replicas)
    }

    pub fn target(&self) -> WorkloadTarget {
        WorkloadTarget::new(&self.target_namespace, &self.target_deployment)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics_timeout_secs)
    }

    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            endpoint: self.oracle_url.clone(),
            api_key: self.oracle_api_key.clone(),
            model: self.oracle_model.clone(),
            max_tokens: self.oracle_max_tokens,
            timeout: Duration::from_secs(self.oracle_timeout_secs),
            api_version: self.oracle_api_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("AUTOSCALER").source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = AutoscalerConfig::from_source(env(&[])).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.cooldown(), Duration::from_secs(120));
        assert_eq!(config.bounds().unwrap(), Bounds::new(1, 10).unwrap());
        assert_eq!(config.target(), WorkloadTarget::new("default", "sample-app"));
        assert_eq!(config.oracle_max_tokens, 300);
        assert_eq!(config.metrics_timeout(), Duration::from_secs(8));
        assert!(config.oracle_url.is_none());
        assert!(config.oracle_api_key.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let config = AutoscalerConfig::from_source(env(&[
            ("AUTOSCALER_POLL_INTERVAL_SECS", "15"),
            ("AUTOSCALER_MAX_REPLICAS", "20"),
            ("AUTOSCALER_TARGET_DEPLOYMENT", "checkout"),
            ("AUTOSCALER_ORACLE_URL", "https://llm.example.com/v1/messages"),
            ("AUTOSCALER_ORACLE_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.max_replicas, 20);
        assert_eq!(config.target_deployment, "checkout");

        let oracle = config.oracle_config();
        assert_eq!(
            oracle.endpoint.as_deref(),
            Some("https://llm.example.com/v1/messages")
        );
        assert_eq!(oracle.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let result = AutoscalerConfig::from_source(env(&[
            ("AUTOSCALER_MIN_REPLICAS", "5"),
            ("AUTOSCALER_MAX_REPLICAS", "2"),
        ]));
        assert!(result.is_err());

        let result = AutoscalerConfig::from_source(env(&[("AUTOSCALER_MIN_REPLICAS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result =
            AutoscalerConfig::from_source(env(&[("AUTOSCALER_POLL_INTERVAL_SECS", "0")]));
        assert!(result.is_err());
    }
}
