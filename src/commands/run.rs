//! Run a diagnostic tool against the live cluster and print its report

use crate::client::{create_client, KubeCluster};
use crate::config::{AppConfig, OutputFormat};
use crate::diagnose::{Finding, Report, ReportSummary};
use crate::error::{KdError, Result};
use crate::output::{colorize_report, format_json, format_yaml};
use crate::tools;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Structured form of a tool run for `-o json|yaml`
#[derive(Debug, Serialize)]
pub struct ToolOutput<'a> {
    pub tool: &'a str,
    pub findings: &'a [Finding],
    pub summary: ReportSummary,
    pub output: String,
}

impl<'a> ToolOutput<'a> {
    pub fn new(tool: &'a str, report: &'a Report) -> Self {
        Self {
            tool,
            findings: &report.findings,
            summary: report.summary(),
            output: report.render(),
        }
    }
}

/// Render a report in the requested format
pub fn render_report(tool: &str, report: &Report, format: OutputFormat, colors: bool) -> Result<String> {
    match format {
        OutputFormat::Text if colors => Ok(colorize_report(&report.render())),
        OutputFormat::Text => Ok(report.render()),
        OutputFormat::Json => Ok(format_json(&ToolOutput::new(tool, report))?),
        OutputFormat::Yaml => Ok(format_yaml(&ToolOutput::new(tool, report))?),
    }
}

/// Connect to the cluster; Ctrl-C cancels the run at the next API call
pub async fn connect(context: Option<&str>, config: &AppConfig) -> Result<KubeCluster> {
    let client = create_client(context).await?;
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });
    Ok(KubeCluster::new(client, config.limits()).with_cancellation(token))
}

/// Parse the raw JSON argument string of `kd call`
pub fn parse_call_args(raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| KdError::InvalidArgument(format!("arguments are not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(KdError::InvalidArgument("arguments must be a JSON object".into()));
    }
    Ok(value)
}

/// Run one tool and print the rendered report to stdout
pub async fn run_tool(
    context: Option<&str>,
    config: &AppConfig,
    tool: &str,
    args: Value,
    format: OutputFormat,
    colors: bool,
) -> Result<()> {
    if tools::find(tool).is_none() {
        return Err(KdError::UnknownTool(tool.to_string()));
    }
    let cluster = connect(context, config).await?;
    let report = tools::invoke_with(&cluster, config, tool, args).await?;
    println!("{}", render_report(tool, &report, format, colors)?);
    Ok(())
}
