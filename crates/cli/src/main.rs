//! LLM Autoscaler operator CLI
//!
//! Inspects what the controller sees and what the decision oracle would
//! recommend, without writing anything to the cluster.

mod commands;
mod output;

use anyhow::Result;
use autoscaler_lib::AutoscalerConfig;
use clap::{Parser, Subcommand};

/// LLM Autoscaler CLI
#[derive(Parser)]
#[command(name = "scalerctl")]
#[command(author, version, about = "CLI for the LLM Autoscaler", long_about = None)]
pub struct Cli {
    /// Target namespace (overrides AUTOSCALER_TARGET_NAMESPACE)
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Target deployment (overrides AUTOSCALER_TARGET_DEPLOYMENT)
    #[arg(long, short)]
    pub deployment: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the context the controller would build right now
    Context,

    /// Print the prompt that would be sent to the decision oracle
    Prompt,

    /// Ask the oracle for a decision without applying it
    Decide,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AutoscalerConfig::load()?;
    if let Some(namespace) = cli.namespace {
        config.target_namespace = namespace;
    }
    if let Some(deployment) = cli.deployment {
        config.target_deployment = deployment;
    }

    match cli.command {
        Commands::Context => commands::show_context(&config, cli.format).await?,
        Commands::Prompt => commands::show_prompt(&config).await?,
        Commands::Decide => commands::decide(&config, cli.format).await?,
        Commands::Config => commands::show_config(&config, cli.format)?,
    }

    Ok(())
}
