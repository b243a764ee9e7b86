//! HTTP client for the generative model endpoint

use super::parse::{extract_text, try_parse_decision};
use super::prompt::build_prompt;
use super::DecisionOracle;
use crate::error::OracleError;
use crate::models::{Bounds, Context, Decision};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the oracle client
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Chat-style completion endpoint; the oracle is unavailable when unset
    pub endpoint: Option<String>,
    /// Sent as the `x-api-key` header; the oracle is unavailable when unset
    pub api_key: Option<String>,
    pub model: String,
    /// Response length budget
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Sent as `anthropic-version` when set
    pub api_version: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "claude-3-5-sonnet".to_string(),
            max_tokens: 300,
            timeout: Duration::from_secs(20),
            api_version: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

/// Decision oracle backed by a generative language model
pub struct LlmOracle {
    client: Client,
    config: OracleConfig,
    bounds: Bounds,
}

impl LlmOracle {
    pub fn new(config: OracleConfig, bounds: Bounds) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create oracle HTTP client")?;

        Ok(Self {
            client,
            config,
            bounds,
        })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Send `prompt` and return the extracted reply text
    pub async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or(OracleError::MissingEndpoint)?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(OracleError::MissingCredentials)?;

        let payload = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
        };

        let mut request = self
            .client
            .post(endpoint)
            .header("x-api-key", api_key)
            .json(&payload);
        if let Some(version) = &self.config.api_version {
            request = request.header("anthropic-version", version);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(extract_text(&body))
    }
}

#[async_trait]
impl DecisionOracle for LlmOracle {
    async fn decide(&self, context: &Context) -> Result<Decision, OracleError> {
        let prompt = build_prompt(context, self.bounds);
        let raw = self.complete(&prompt).await?;
        debug!(raw = %raw, "Raw oracle reply");

        let Some(decision) = try_parse_decision(&raw) else {
            warn!(raw = %raw, "Oracle reply is not valid JSON, degrading to noop");
            return Ok(Decision::bad_json());
        };
        info!(
            action = %decision.action,
            replicas = ?decision.replicas,
            confidence = decision.confidence,
            "Oracle decision parsed"
        );
        Ok(decision)
    }
}
