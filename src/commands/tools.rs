//! `kd tools`: list the registered tools

use crate::config::OutputFormat;
use crate::error::Result;
use crate::output::{format_json, format_table_raw, format_yaml, truncate_line};
use crate::tools::{registry, ToolSpec};

fn required_args(tool: &ToolSpec) -> String {
    let required: Vec<&str> = tool.parameters["required"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    if required.is_empty() {
        "-".to_string()
    } else {
        required.join(", ")
    }
}

pub fn format_tools(format: OutputFormat) -> Result<String> {
    let tools = registry();
    match format {
        OutputFormat::Json => Ok(format_json(&tools)?),
        OutputFormat::Yaml => Ok(format_yaml(&tools)?),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = tools
                .iter()
                .map(|t| vec![t.name.to_string(), required_args(t), truncate_line(t.description, 80)])
                .collect();
            Ok(format_table_raw(&["TOOL", "REQUIRED", "DESCRIPTION"], &rows))
        }
    }
}

pub fn list_tools(format: OutputFormat) -> Result<()> {
    println!("{}", format_tools(format)?);
    Ok(())
}
