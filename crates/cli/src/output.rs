//! Structured output handling for CLI commands.

use owo_colors::OwoColorize;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tallygate_common::models::{Aggregate, Dashboard, QueryResponse, ResponseData, RowSet};

use crate::exit_codes;

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq, Eq, Copy)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Returns true if the output format is intended for machine consumption
    pub fn is_machine_readable(&self) -> bool {
        match self {
            OutputFormat::Human => false,
            OutputFormat::Json | OutputFormat::Yaml => true,
        }
    }
}

/// Envelope for machine-readable output
#[derive(Serialize)]
pub struct CommandResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(flatten)]
    pub data: T,
}

impl<T> CommandResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            exit_code: Some(exit_codes::SUCCESS),
            data,
        }
    }

    pub fn error(message: String, exit_code: i32, data: T) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message),
            exit_code: Some(exit_code),
            data,
        }
    }
}

/// Print the output to stdout in the requested format
pub fn print_output<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    match format {
        // Human commands print their own output.
        OutputFormat::Human => {}
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&data)?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&data)?;
            println!("{}", yaml);
        }
    }
    Ok(())
}

/// Print a structured success response for machine outputs
pub fn print_success<T: Serialize>(format: OutputFormat, data: T) -> anyhow::Result<()> {
    if format == OutputFormat::Human {
        return Ok(());
    }

    let response = CommandResponse::success(data);
    print_output(format, response)
}

/// Print a structured error response for machine outputs.
/// In human mode main prints the error to stderr itself.
pub fn print_error<T: Serialize + Default>(
    format: OutputFormat,
    message: &str,
    exit_code: i32,
) -> anyhow::Result<()> {
    if format == OutputFormat::Human {
        return Ok(());
    }

    let response = CommandResponse::error(message.to_string(), exit_code, T::default());
    print_output(format, response)
}

/// Print a query response and return the exit code it maps to.
pub fn print_response(format: OutputFormat, response: &QueryResponse) -> anyhow::Result<i32> {
    let exit_code = match (response.success, response.error_code) {
        (true, _) => exit_codes::SUCCESS,
        (false, Some(code)) => exit_codes::for_error_code(code),
        (false, None) => exit_codes::GENERAL_ERROR,
    };

    if format.is_machine_readable() {
        // The response carries its own message.
        let envelope = CommandResponse {
            status: if response.success { "success" } else { "error" }.to_string(),
            message: None,
            exit_code: Some(exit_code),
            data: response,
        };
        print_output(format, envelope)?;
        return Ok(exit_code);
    }

    if !response.success {
        let code = response
            .error_code
            .map(|c| format!(" [{}]", c))
            .unwrap_or_default();
        eprintln!("{}{} {}", "Error".red().bold(), code.red(), response.message);
        if let Some(hint) = &response.hint {
            eprintln!("  {} {}", "hint:".yellow(), hint);
        }
        if response.retryable {
            eprintln!("  {}", "This failure is transient; retrying may succeed.".dimmed());
        }
        return Ok(exit_code);
    }

    match &response.data {
        Some(ResponseData::Rows(rows)) => print!("{}", render_rows(rows)),
        Some(ResponseData::Aggregate(agg)) => print!("{}", render_aggregate(agg)),
        Some(ResponseData::Dashboard(dashboard)) => print!("{}", render_dashboard(dashboard)),
        None => {}
    }

    let source = if response.cache_hit { "cache" } else { "source" };
    println!(
        "{} {} {}",
        "✓".green(),
        response.message,
        format!("({}, {} ms)", source, response.execution_time_ms).dimmed()
    );
    Ok(exit_code)
}

/// Each section under its own heading. A failed section shows its error line.
pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    for section in &dashboard.sections {
        out.push_str(&format!("== {} ==\n", section.name));
        let response = &section.response;
        if !response.success {
            let code = response
                .error_code
                .map(|c| format!("[{}] ", c))
                .unwrap_or_default();
            out.push_str(&format!("error: {}{}\n", code, response.message));
        } else {
            match &response.data {
                Some(ResponseData::Rows(rows)) => out.push_str(&render_rows(rows)),
                Some(ResponseData::Aggregate(agg)) => out.push_str(&render_aggregate(agg)),
                Some(ResponseData::Dashboard(inner)) => out.push_str(&render_dashboard(inner)),
                None => {}
            }
        }
        out.push('\n');
    }
    out
}

fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Render a cell for a plain-text table.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Left-aligned table with a header row and a rule under it.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(&rule));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

pub fn render_rows(rows: &RowSet) -> String {
    if rows.rows.is_empty() {
        return "(no rows)\n".to_string();
    }
    let body: Vec<Vec<String>> = rows
        .rows
        .iter()
        .map(|r| r.iter().map(cell_text).collect())
        .collect();
    render_table(&rows.columns, &body)
}

pub fn render_aggregate(agg: &Aggregate) -> String {
    let mut headers = vec![String::new()];
    headers.extend(agg.columns.iter().cloned());
    let body: Vec<Vec<String>> = agg
        .rows
        .iter()
        .map(|r| {
            let mut cells = vec![r.label.clone()];
            cells.extend(r.values.iter().map(|v| format_decimal(*v)));
            cells
        })
        .collect();

    let mut out = format!("{}\n\n", agg.title);
    out.push_str(&render_table(&headers, &body));
    out.push('\n');
    for (key, value) in &agg.summary {
        out.push_str(&format!("{}: {}\n", key, format_decimal(*value)));
    }
    out
}
