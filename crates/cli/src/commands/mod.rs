//! CLI commands; none of them write to the cluster

use anyhow::{Context as _, Result};
use autoscaler_lib::{
    controller::DecisionPreview,
    metrics::PrometheusClient,
    oracle::{build_prompt, LlmOracle},
    orchestrator::KubeOrchestrator,
    AutoscalerConfig, Context, Controller, ControllerBuilder,
};
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;

use crate::output::{
    color_action, color_confidence, format_cpu, print_fields, print_info, print_json,
    print_success, print_warning, FieldRow, OutputFormat,
};

async fn build_controller(config: &AutoscalerConfig) -> Result<Controller> {
    let bounds = config.bounds()?;
    let orchestrator = KubeOrchestrator::connect(bounds, config.restart_annotation.clone())
        .await
        .context("Cannot establish Kubernetes session")?;
    let metrics = PrometheusClient::new(&config.prometheus_url, config.metrics_timeout())?;
    let oracle = LlmOracle::new(config.oracle_config(), bounds)?;

    ControllerBuilder::new()
        .metrics(Arc::new(metrics))
        .orchestrator(Arc::new(orchestrator))
        .oracle(Arc::new(oracle))
        .target(config.target())
        .bounds(bounds)
        .cooldown(config.cooldown())
        .rate_window(config.cpu_rate_window.clone())
        .build()
}

fn context_rows(context: &Context) -> Vec<FieldRow> {
    let mut rows = vec![
        FieldRow::new("Time", context.time.to_rfc3339()),
        FieldRow::new(
            "Workload",
            format!("{}/{}", context.namespace, context.deployment),
        ),
        FieldRow::new("Replicas", context.current_replicas.to_string()),
    ];
    if let Some(available) = context.available_replicas {
        rows.push(FieldRow::new("Available", available.to_string()));
    }
    let cpu = if context.metrics_degraded {
        "unavailable".yellow().to_string()
    } else {
        format_cpu(context.cpu)
    };
    rows.push(FieldRow::new("CPU", cpu));
    rows
}

/// Show the context the controller would build now
pub async fn show_context(config: &AutoscalerConfig, format: OutputFormat) -> Result<()> {
    let controller = build_controller(config).await?;
    let context = controller.gather_context(Utc::now()).await?;

    match format {
        OutputFormat::Json => print_json(&context)?,
        OutputFormat::Table => {
            print_fields(&context_rows(&context));
            if context.metrics_degraded {
                print_warning("CPU metrics unavailable; the controller would send cpu=0");
            }
        }
    }
    Ok(())
}

/// Print the prompt for the current context
pub async fn show_prompt(config: &AutoscalerConfig) -> Result<()> {
    let controller = build_controller(config).await?;
    let context = controller.gather_context(Utc::now()).await?;
    println!("{}", build_prompt(&context, controller.bounds()));
    Ok(())
}

#[derive(Serialize)]
struct DecisionView<'a> {
    context: &'a Context,
    decision: &'a autoscaler_lib::Decision,
    planned_replicas: Option<u32>,
}

/// Ask the oracle for a decision and show what would be applied
pub async fn decide(config: &AutoscalerConfig, format: OutputFormat) -> Result<()> {
    let controller = build_controller(config).await?;
    let DecisionPreview {
        context,
        decision,
        planned_replicas,
    } = controller.preview(Utc::now()).await?;

    match format {
        OutputFormat::Json => print_json(&DecisionView {
            context: &context,
            decision: &decision,
            planned_replicas,
        })?,
        OutputFormat::Table => {
            let mut rows = context_rows(&context);
            rows.push(FieldRow::new("Action", color_action(decision.action)));
            if let Some(requested) = decision.replicas {
                rows.push(FieldRow::new("Requested", requested.to_string()));
            }
            rows.push(FieldRow::new("Reason", decision.reason.clone()));
            rows.push(FieldRow::new(
                "Confidence",
                color_confidence(decision.confidence),
            ));
            print_fields(&rows);

            match planned_replicas {
                Some(n) if decision.replicas != Some(n as i64) => print_warning(&format!(
                    "Request clamped into [{}, {}]: would write {} replicas",
                    controller.bounds().min(),
                    controller.bounds().max(),
                    n
                )),
                Some(n) => print_success(&format!("Would write {} replicas", n)),
                None => print_info("No replica change would be written"),
            }
        }
    }
    Ok(())
}

/// Show the effective configuration with the API key redacted
pub fn show_config(config: &AutoscalerConfig, format: OutputFormat) -> Result<()> {
    let mut redacted = config.clone();
    if redacted.oracle_api_key.is_some() {
        redacted.oracle_api_key = Some("***".to_string());
    }

    match format {
        OutputFormat::Json => print_json(&redacted)?,
        OutputFormat::Table => {
            let optional = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
            print_fields(&[
                FieldRow::new("Workload", redacted.target().to_string()),
                FieldRow::new(
                    "Bounds",
                    format!("[{}, {}]", redacted.min_replicas, redacted.max_replicas),
                ),
                FieldRow::new("Poll interval", format!("{}s", redacted.poll_interval_secs)),
                FieldRow::new("Cooldown", format!("{}s", redacted.cooldown_secs)),
                FieldRow::new("Prometheus", redacted.prometheus_url.clone()),
                FieldRow::new("Oracle URL", optional(&redacted.oracle_url)),
                FieldRow::new("Oracle model", redacted.oracle_model.clone()),
                FieldRow::new("Oracle API key", optional(&redacted.oracle_api_key)),
                FieldRow::new("Restart annotation", redacted.restart_annotation.clone()),
            ]);
        }
    }
    Ok(())
}
