//! `tallygate filter`: run a structured filter set from a file.

use anyhow::Result;
use owo_colors::OwoColorize;
use tallygate_common::config::AppConfig;
use tallygate_common::models::QueryRequest;

use super::helpers::{build_executor, read_filter_file};
use crate::output::{self, OutputFormat};

pub async fn filter(
    file_path: &str,
    company: Option<String>,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<i32> {
    let mut filters = read_filter_file(file_path)?;
    if company.is_some() {
        filters.company = company;
    }

    if !format.is_machine_readable() {
        println!(
            "{} {} {}",
            "[Filter:".dimmed(),
            file_path.yellow(),
            format!("] {} query", filters.entity).bold().cyan()
        );
    }

    let executor = build_executor(config).await?;
    let response = executor.handle(&QueryRequest::Structured(filters)).await;
    output::print_response(format, &response)
}
