//! `tallygate validate-config`.
//!
//! Loading the configuration already runs schema and range validation. Unless
//! `--offline` is given, the configured source is also built and pinged once.

use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;
use tallygate_common::config::AppConfig;

use super::helpers::{build_executor, ValidateResult};
use crate::exit_codes;
use crate::output::{self, OutputFormat};

pub async fn validate_config(
    config: &AppConfig,
    config_file: Option<&Path>,
    offline: bool,
    format: OutputFormat,
) -> Result<i32> {
    let mut result = ValidateResult {
        valid: true,
        config_file: config_file.map(|p| p.display().to_string()),
        source_name: config.source.name.clone(),
        source_type: config.source.source_type.clone(),
        pool_size: config.pool.max_size,
        cache_enabled: config.cache.enabled,
        connection_checked: false,
        errors: Vec::new(),
    };

    if !format.is_machine_readable() {
        let file = result
            .config_file
            .clone()
            .unwrap_or_else(|| "(defaults and environment)".to_string());
        println!(
            "{} {} {}",
            "[Config:".dimmed(),
            file.yellow(),
            "] Configuration is valid.".bold().cyan()
        );
        println!(
            "  source: {} ({}), pool size {}, cache {}",
            result.source_name,
            result.source_type,
            result.pool_size,
            if result.cache_enabled { "on" } else { "off" }
        );
    }

    let mut exit_code = exit_codes::SUCCESS;
    if offline {
        if !format.is_machine_readable() {
            println!("{}", "Skipping connection check (offline mode).".dimmed());
        }
    } else {
        result.connection_checked = true;
        match build_executor(config).await {
            Ok(executor) => {
                let check = executor.test_connection().await;
                if !check.success {
                    result.valid = false;
                    result.errors.push(check.message.clone());
                    exit_code = check
                        .error_code
                        .map(exit_codes::for_error_code)
                        .unwrap_or(exit_codes::CONNECTION_ERROR);
                }
            }
            Err(e) => {
                result.valid = false;
                result.errors.push(e.to_string());
                exit_code = exit_codes::CONFIG_ERROR;
            }
        }

        if !format.is_machine_readable() {
            if result.valid {
                println!("{} Source is reachable.", "✓".green());
            } else {
                for error in &result.errors {
                    eprintln!("{} {}", "✗".red(), error);
                }
            }
        }
    }

    if format.is_machine_readable() {
        if result.valid {
            output::print_success(format, &result)?;
        } else {
            output::print_output(
                format,
                output::CommandResponse::error(
                    "Validation failed".to_string(),
                    exit_code,
                    &result,
                ),
            )?;
        }
    }
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tallygate_common::config::SourceSettings;

    fn fixture_config(path: Option<String>) -> AppConfig {
        AppConfig {
            source: SourceSettings {
                source_type: "fixture".to_string(),
                fixture_path: path,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reachable_fixture_is_valid() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "companies:\n  - name: Acme Traders\n").unwrap();
        let config = fixture_config(Some(file.path().to_string_lossy().into_owned()));

        let code = validate_config(&config, None, false, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, exit_codes::SUCCESS);
    }

    #[tokio::test]
    async fn test_missing_fixture_is_a_config_error() {
        let config = fixture_config(None);
        let code = validate_config(&config, None, false, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, exit_codes::CONFIG_ERROR);
    }

    #[tokio::test]
    async fn test_offline_skips_source() {
        let config = fixture_config(None);
        let code = validate_config(&config, None, true, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, exit_codes::SUCCESS);
    }
}
