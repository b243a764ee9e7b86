//! Decision oracle
//!
//! Builds a schema-constrained prompt, asks a generative model for a
//! scaling decision and turns its reply into a validated [`Decision`].
//! Malformed replies never surface as errors: they degrade to `noop`.

mod client;
mod parse;
mod prompt;

pub use client::{LlmOracle, OracleConfig};
pub use parse::{extract_text, parse_decision, try_parse_decision};
pub use prompt::build_prompt;

use crate::error::OracleError;
use crate::models::{Context, Decision};
use async_trait::async_trait;

/// Source of scaling decisions
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Produce a validated decision for this tick's context.
    ///
    /// Errors only when the oracle could not be consulted at all.
    async fn decide(&self, context: &Context) -> Result<Decision, OracleError>;
}
