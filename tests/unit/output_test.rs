//! Tests for report rendering in text, JSON and YAML

use kubedoctor::commands::{format_tools, parse_call_args, render_report};
use kubedoctor::config::OutputFormat;
use kubedoctor::diagnose::{Finding, Report};
use kubedoctor::error::KdError;
use serde_json::Value;

fn sample_report() -> Report {
    let mut report = Report::new("Service Diagnosis: api (namespace: shop)");
    report.section("Endpoints");
    report.flag(Finding::critical("Service has 0 ready endpoints").with_remediation("Check pod readiness probes"));
    report.add(Finding::info("Container 'main' has no CPU limit set"));
    report
}

// ============================================================================
// render_report tests
// ============================================================================

#[test]
fn test_text_render_without_colors() {
    let text = render_report("diagnose_service", &sample_report(), OutputFormat::Text, false).unwrap();
    assert!(text.contains("Service Diagnosis: api (namespace: shop)"));
    assert!(text.contains("FINDINGS:"));
    assert!(text.contains("Check pod readiness probes"));
    assert!(!text.contains('\u{1b}'));
}

#[test]
fn test_json_render_carries_findings_and_summary() {
    let json = render_report("diagnose_service", &sample_report(), OutputFormat::Json, false).unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["tool"], "diagnose_service");
    assert_eq!(value["findings"][0]["severity"], "critical");
    assert_eq!(value["summary"]["critical_count"], 1);
    assert_eq!(value["summary"]["info_count"], 1);
    assert!(value["output"].as_str().unwrap().contains("FINDINGS:"));
}

#[test]
fn test_yaml_render() {
    let yaml = render_report("diagnose_service", &sample_report(), OutputFormat::Yaml, true).unwrap();
    assert!(yaml.contains("tool: diagnose_service"));
    assert!(yaml.contains("severity: critical"));
}

// ============================================================================
// Tool listing and call arguments
// ============================================================================

#[test]
fn test_tool_table_lists_required_arguments() {
    let table = format_tools(OutputFormat::Text).unwrap();
    let first = table.lines().next().unwrap();
    assert!(first.starts_with("TOOL"));
    let pod_row = table.lines().find(|l| l.starts_with("diagnose_pod ")).unwrap();
    assert!(pod_row.contains("namespace, pod"));
    let dns_row = table.lines().find(|l| l.starts_with("check_dns_health ")).unwrap();
    assert!(dns_row.contains(" - "));
}

#[test]
fn test_call_arguments_must_be_an_object() {
    assert!(parse_call_args(r#"{"namespace":"shop"}"#).unwrap().is_object());
    assert!(matches!(parse_call_args("[1,2]"), Err(KdError::InvalidArgument(_))));
    assert!(matches!(parse_call_args("namespace=shop"), Err(KdError::InvalidArgument(_))));
}
