//! `tallygate report`: run one of the fixed reports.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use tallygate_common::config::AppConfig;
use tallygate_runtime::{Report, VoucherType};

use super::helpers::build_executor;
use crate::output::{self, OutputFormat};

#[derive(Debug, Default, Clone)]
pub struct ReportOptions {
    pub company: Option<String>,
    pub group: Option<String>,
    pub voucher_type: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Resolve a report name and apply the options it accepts.
pub fn resolve_report(name: &str, options: &ReportOptions) -> Result<Report> {
    let report = Report::from_name(name).ok_or_else(|| {
        anyhow!(
            "Unknown report '{}'. Available reports: {}",
            name,
            Report::NAMES.join(", ")
        )
    })?;

    let report = match report {
        Report::Ledgers { .. } => Report::Ledgers {
            group: options.group.clone(),
        },
        Report::Vouchers { .. } => {
            let voucher_type = options
                .voucher_type
                .as_deref()
                .map(|t| {
                    VoucherType::parse(t).ok_or_else(|| {
                        anyhow!(
                            "Unknown voucher type '{}'. Expected one of: {}",
                            t,
                            VoucherType::names().join(", ")
                        )
                    })
                })
                .transpose()?;
            Report::Vouchers {
                voucher_type,
                from: options.from,
                to: options.to,
            }
        }
        other => other,
    };
    Ok(report)
}

pub async fn report(
    name: &str,
    options: ReportOptions,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<i32> {
    let report = resolve_report(name, &options)?;

    if !format.is_machine_readable() {
        println!("{} {}", "Report:".bold().cyan(), report.name().bold());
    }

    let executor = build_executor(config).await?;
    let response = executor.run_report(&report, options.company).await;
    output::print_response(format, &response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_group_option() {
        let options = ReportOptions {
            group: Some("Bank Accounts".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_report("ledgers", &options).unwrap(),
            Report::Ledgers {
                group: Some("Bank Accounts".to_string())
            }
        );
    }

    #[test]
    fn test_voucher_options() {
        let options = ReportOptions {
            voucher_type: Some("credit note".to_string()),
            from: NaiveDate::from_ymd_opt(2024, 4, 1),
            ..Default::default()
        };
        assert_eq!(
            resolve_report("vouchers", &options).unwrap(),
            Report::Vouchers {
                voucher_type: Some(VoucherType::CreditNote),
                from: NaiveDate::from_ymd_opt(2024, 4, 1),
                to: None,
            }
        );
    }

    #[test]
    fn test_unknown_names_rejected() {
        let err = resolve_report("trial-balance", &ReportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("sundry-debtors"));

        let options = ReportOptions {
            voucher_type: Some("Memo".to_string()),
            ..Default::default()
        };
        assert!(resolve_report("vouchers", &options).is_err());
    }
}
