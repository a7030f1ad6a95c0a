use anyhow::Result;
use owo_colors::OwoColorize;
use tallygate_common::config::AppConfig;

use super::helpers::build_executor;
use crate::output::{self, OutputFormat};

/// Open one session against the configured source, ping it and report the round trip.
pub async fn test_connection(format: OutputFormat, config: &AppConfig) -> Result<i32> {
    if !format.is_machine_readable() {
        println!(
            "{} {} ({})...",
            "Testing connection to".bold().cyan(),
            config.source.name.yellow(),
            config.source.source_type
        );
    }

    let executor = build_executor(config).await?;
    output::print_response(format, &executor.test_connection().await)
}
