//! Output formatting for kubedoctor

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Format raw headers and rows as a column-aligned table
pub fn format_table_raw(headers: &[&str], rows: &[Vec<String>]) -> String {
    let num_cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < num_cols {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut output, &header_cells, &widths);
    for row in rows {
        push_row(&mut output, row, &widths);
    }

    output.trim_end().to_string()
}

fn push_row(output: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate().take(widths.len()) {
        let padding = widths[i].saturating_sub(cell.chars().count());
        line.push_str(cell);
        line.push_str(&" ".repeat(padding + 2));
    }
    output.push_str(line.trim_end());
    output.push('\n');
}

/// Colorize severity tags and section headers of a rendered report for a terminal
pub fn colorize_report(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.contains("[CRITICAL]") {
                line.red().to_string()
            } else if line.contains("[WARNING]") {
                line.yellow().to_string()
            } else if line.contains("[INFO]") {
                line.cyan().to_string()
            } else if line.contains("[OK]") {
                line.green().to_string()
            } else if line.starts_with("===") || line.starts_with("FINDINGS:") || line.starts_with("SUGGESTED ACTIONS:") {
                line.bold().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize any value as pretty JSON
pub fn format_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Serialize any value as YAML
pub fn format_yaml<T: Serialize>(value: &T) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}

/// Human readable age from a Kubernetes timestamp
pub fn format_age(time: Option<&Time>) -> String {
    match time {
        Some(t) => format_duration_since(t.0, Utc::now()),
        None => "<unknown>".to_string(),
    }
}

/// Compact duration between `then` and `now` (e.g. `3d`, `5h`, `12m`, `40s`)
pub fn format_duration_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(then).num_seconds().max(0);
    if secs >= 86_400 {
        format!("{}d", secs / 86_400)
    } else if secs >= 3_600 {
        format!("{}h", secs / 3_600)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Format a byte count using binary units
pub fn format_bytes(bytes: i64) -> String {
    const KI: f64 = 1024.0;
    const MI: f64 = KI * 1024.0;
    const GI: f64 = MI * 1024.0;

    let b = bytes as f64;
    if b >= GI {
        format!("{:.1}Gi", b / GI)
    } else if b >= MI {
        format!("{:.1}Mi", b / MI)
    } else if b >= KI {
        format!("{:.1}Ki", b / KI)
    } else {
        format!("{}B", bytes)
    }
}

/// `k=v` pairs joined by commas, or `<none>`
pub fn format_labels(labels: Option<&BTreeMap<String, String>>) -> String {
    match labels {
        Some(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
        _ => "<none>".to_string(),
    }
}

/// Shorten a name to `max` characters, marking the cut with `..`
pub fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    if max < 3 {
        return name.chars().take(max).collect();
    }
    let kept: String = name.chars().take(max - 2).collect();
    format!("{}..", kept)
}

/// Truncate a free-form line, appending `...` when cut
pub fn truncate_line(line: &str, max: usize) -> String {
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let kept: String = line.chars().take(max).collect();
        format!("{}...", kept)
    }
}

/// Percentage of `part` over `whole`, zero when `whole` is zero
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
