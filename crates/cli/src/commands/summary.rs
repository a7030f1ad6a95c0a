//! `tallygate summary`: financial, stock or full dashboard summary.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use tallygate_common::config::AppConfig;
use tallygate_common::models::{DashboardFilters, RequestContext};
use tallygate_runtime::Summary;

use super::helpers::build_executor;
use crate::output::{self, OutputFormat};

#[derive(Debug, Default, Clone)]
pub struct SummaryOptions {
    pub company: Option<String>,
    pub today: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SummaryOptions {
    fn into_parts(self) -> (RequestContext, Option<DashboardFilters>) {
        let filters = (self.from.is_some() || self.to.is_some()).then(|| DashboardFilters {
            company: self.company.clone(),
            date_from: self.from,
            date_to: self.to,
            ..Default::default()
        });
        let context = RequestContext {
            company: self.company,
            today: self.today,
        };
        (context, filters)
    }
}

pub fn resolve_summary(name: &str) -> Result<Summary> {
    Summary::from_name(name).ok_or_else(|| {
        anyhow!(
            "Unknown summary '{}'. Available summaries: {}",
            name,
            Summary::NAMES.join(", ")
        )
    })
}

pub async fn summary(
    name: &str,
    options: SummaryOptions,
    format: OutputFormat,
    config: &AppConfig,
) -> Result<i32> {
    let summary = resolve_summary(name)?;

    if !format.is_machine_readable() {
        println!("{} {}", "Summary:".bold().cyan(), summary.name().bold());
    }

    let (context, filters) = options.into_parts();
    let executor = build_executor(config).await?;
    let response = executor
        .run_summary(summary, &context, filters.as_ref())
        .await;
    output::print_response(format, &response)
}
