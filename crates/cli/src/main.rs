//! tallygate CLI: ask the accounting engine questions without writing SQL.
//!
//! Every command goes through the same mediation pipeline as the service:
//! query builder, whitelist, result cache and connection pool.
//!
//! # Commands
//!
//! - `ask`: Answer a free-text question ("sales for the last 6 months").
//! - `filter`: Run a structured filter set from a YAML or JSON file.
//! - `report`: Run a fixed report (ledgers, sundry debtors, vouchers, ...).
//! - `summary`: Financial summary, stock summary or the whole dashboard.
//! - `test-connection`: Check that the configured source answers.
//! - `validate-config`: Check the configuration and, unless offline, the source.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use owo_colors::OwoColorize;

mod commands;
mod config;
mod exit_codes;
mod output;

use commands::{AskOptions, ReportOptions, SummaryOptions};
use output::OutputFormat;
use tallygate_common::config::AppConfig;
use tallygate_common::telemetry::init_logging;
use tallygate_error::GateError;

#[derive(Parser)]
#[command(name = "tallygate")]
#[command(about = "Query the accounting engine through the tallygate mediation layer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (human, json, yaml)
    #[arg(long, global = true, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Path to the configuration file
    #[arg(long, global = true, env = "TALLYGATE_CONFIG")]
    config: Option<String>,

    /// Log level filter, overrides `logging.level` (RUST_LOG still wins)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a free-text question
    Ask {
        /// The question, e.g. "top 5 customers this year"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Company to query
        #[arg(long)]
        company: Option<String>,
        /// Anchor date for relative windows (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Start of the date window, overrides dates in the question
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End of the date window, overrides dates in the question
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Restrict to one voucher type
        #[arg(long)]
        voucher_type: Option<String>,
        /// Restrict to one ledger group
        #[arg(long)]
        group: Option<String>,
    },
    /// Run a structured filter set from a YAML or JSON file
    Filter {
        /// Path to the filter file
        file: String,
        /// Company to query, overrides the file
        #[arg(long)]
        company: Option<String>,
    },
    /// Run a fixed report
    Report {
        /// companies, ledgers, sundry-debtors, sundry-creditors, vouchers, stock-items or expense-ledgers
        name: String,
        /// Company to query
        #[arg(long)]
        company: Option<String>,
        /// Ledger group (ledgers report)
        #[arg(long)]
        group: Option<String>,
        /// Voucher type (vouchers report)
        #[arg(long)]
        voucher_type: Option<String>,
        /// Start date (vouchers report)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date (vouchers report)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Compute a financial, stock or dashboard summary
    Summary {
        /// financial, stock or dashboard
        name: String,
        /// Company to query
        #[arg(long)]
        company: Option<String>,
        /// Anchor date for relative windows (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Start of the cash window
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End of the cash window
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Check that the configured source answers
    TestConnection,
    /// Validate the configuration
    ValidateConfig {
        /// Skip the connection check
        #[arg(long, default_value_t = false)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    let cli = Cli::parse();

    let exit_code = match run_cli(&cli).await {
        Ok(code) => code,
        Err(e) => {
            let exit_code = map_error_to_exit_code(&e);
            if cli.output.is_machine_readable() {
                output::print_error::<()>(cli.output, &e.to_string(), exit_code).ok();
            } else {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            }
            exit_code
        }
    };

    if exit_code != exit_codes::SUCCESS {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn map_error_to_exit_code(e: &anyhow::Error) -> i32 {
    if let Some(gate_err) = e.downcast_ref::<GateError>() {
        return exit_codes::for_error_code(gate_err.code);
    }

    // Fallback: string heuristics for errors raised before the pipeline runs
    let s = format!("{:#}", e).to_lowercase();
    if s.contains("usage")
        || s.contains("argument")
        || s.contains("unknown report")
        || s.contains("unknown summary")
        || s.contains("unknown voucher type")
        || s.contains("filter file")
    {
        return exit_codes::USAGE_ERROR;
    }
    if s.contains("config") || s.contains("yaml") {
        return exit_codes::CONFIG_ERROR;
    }
    if s.contains("connect") || s.contains("timeout") {
        return exit_codes::CONNECTION_ERROR;
    }
    exit_codes::GENERAL_ERROR
}

async fn run_cli(cli: &Cli) -> Result<i32, anyhow::Error> {
    let (mut app_config, config_file) = config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        app_config.logging.level = level.clone();
    }
    init_logging(&app_config.logging)?;

    let code = run_command(cli, &app_config, config_file.as_deref()).await?;
    Ok(code)
}

async fn run_command(
    cli: &Cli,
    config: &AppConfig,
    config_file: Option<&std::path::Path>,
) -> Result<i32, anyhow::Error> {
    match &cli.command {
        Commands::Ask {
            text,
            company,
            today,
            from,
            to,
            voucher_type,
            group,
        } => {
            let options = AskOptions {
                company: company.clone(),
                today: *today,
                from: *from,
                to: *to,
                voucher_type: voucher_type.clone(),
                group: group.clone(),
            };
            commands::ask(text, options, cli.output, config).await
        }
        Commands::Filter { file, company } => {
            commands::filter(file, company.clone(), cli.output, config).await
        }
        Commands::Report {
            name,
            company,
            group,
            voucher_type,
            from,
            to,
        } => {
            let options = ReportOptions {
                company: company.clone(),
                group: group.clone(),
                voucher_type: voucher_type.clone(),
                from: *from,
                to: *to,
            };
            commands::report(name, options, cli.output, config).await
        }
        Commands::Summary {
            name,
            company,
            today,
            from,
            to,
        } => {
            let options = SummaryOptions {
                company: company.clone(),
                today: *today,
                from: *from,
                to: *to,
            };
            commands::summary(name, options, cli.output, config).await
        }
        Commands::TestConnection => commands::test_connection(cli.output, config).await,
        Commands::ValidateConfig { offline } => {
            commands::validate_config(config, config_file, *offline, cli.output).await
        }
    }
}
