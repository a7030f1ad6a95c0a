//! `tallygate ask`: answer a free-text question.

use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use tallygate_common::config::AppConfig;
use tallygate_common::models::{DashboardFilters, RequestContext, TextQuery};

use super::helpers::build_executor;
use crate::output::{self, OutputFormat};

/// Dashboard-style overrides passed as flags.
#[derive(Debug, Default, Clone)]
pub struct AskOptions {
    pub company: Option<String>,
    pub today: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub voucher_type: Option<String>,
    pub group: Option<String>,
}

impl AskOptions {
    fn has_filters(&self) -> bool {
        self.from.is_some() || self.to.is_some() || self.voucher_type.is_some() || self.group.is_some()
    }

    pub fn into_request(self, text: String) -> TextQuery {
        let filters = self.has_filters().then(|| DashboardFilters {
            company: self.company.clone(),
            date_from: self.from,
            date_to: self.to,
            voucher_type: self.voucher_type.clone(),
            ledger_group: self.group.clone(),
        });
        TextQuery {
            query_text: text,
            context: RequestContext {
                company: self.company,
                today: self.today,
            },
            filters,
        }
    }
}

pub async fn ask(
    words: &[String],
    options: AskOptions,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<i32> {
    let text = words.join(" ");
    if !format.is_machine_readable() {
        println!("{} {}", "?".cyan().bold(), text.bold());
    }

    let executor = build_executor(config).await?;
    let response = executor.ask(&options.into_request(text)).await;
    output::print_response(format, &response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_question_has_no_dashboard_filters() {
        let request = AskOptions::default().into_request("top 5 customers".to_string());
        assert_eq!(request.query_text, "top 5 customers");
        assert!(request.filters.is_none());
    }

    #[test]
    fn test_flags_become_dashboard_filters() {
        let options = AskOptions {
            company: Some("Acme Traders".to_string()),
            from: NaiveDate::from_ymd_opt(2024, 4, 1),
            voucher_type: Some("Payment".to_string()),
            ..Default::default()
        };
        let request = options.into_request("list vouchers".to_string());
        let filters = request.filters.unwrap();
        assert_eq!(filters.date_from, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(filters.voucher_type.as_deref(), Some("Payment"));
        assert_eq!(filters.company.as_deref(), Some("Acme Traders"));
        assert_eq!(request.context.company.as_deref(), Some("Acme Traders"));
    }
}
