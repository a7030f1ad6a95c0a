//! Shared helpers for CLI commands.
//!
//! - **Wiring**: `build_executor` turns an [`AppConfig`] into a ready [`QueryExecutor`].
//! - **Input**: `read_filter_file` loads a structured request from YAML or JSON.
//! - **Result types**: serializable structs for machine-readable output.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tallygate_common::config::AppConfig;
use tallygate_common::models::FilterSet;
use tallygate_connectors::{default_registry, ConnectionPool};
use tallygate_runtime::{QueryExecutor, ResultCache};
use tracing::debug;

/// Connector, pool and cache for one CLI invocation.
pub async fn build_executor(config: &AppConfig) -> Result<QueryExecutor> {
    let connector = default_registry()
        .create_connector(&config.source, &config.execution)
        .await?;
    debug!(
        source = %config.source.name,
        source_type = %config.source.source_type,
        "Connector ready"
    );

    let pool = ConnectionPool::new(connector, config.pool, config.retry);
    let cache = Arc::new(ResultCache::new(config.cache.clone()));
    Ok(
        QueryExecutor::new(pool, cache, config.execution, config.retry)
            .with_default_company(config.source.company.clone()),
    )
}

/// Parse a filter set from a `.json` file, or YAML for anything else.
pub fn read_filter_file(path: &str) -> Result<FilterSet> {
    let raw = fs::read_to_string(path).context(format!("Failed to read filter file: {}", path))?;
    let is_json = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&raw).context("Failed to parse filter file as JSON")
    } else {
        serde_yaml::from_str(&raw).context("Failed to parse filter file as YAML")
    }
}

#[derive(Serialize)]
pub struct ValidateResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    pub source_name: String,
    pub source_type: String,
    pub pool_size: usize,
    pub cache_enabled: bool,
    pub connection_checked: bool,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_yaml_filter_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "entity: Ledger\nfields: [Name, ClosingBalance]\npredicates:\n  - {{ field: Parent, op: '=', value: Sundry Debtors }}\nlimit: 20\n"
        )
        .unwrap();

        let fs = read_filter_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(fs.entity, "Ledger");
        assert_eq!(fs.fields, vec!["Name", "ClosingBalance"]);
        assert_eq!(fs.predicates[0].value, serde_json::json!("Sundry Debtors"));
        assert_eq!(fs.limit, Some(20));
    }

    #[test]
    fn test_read_json_filter_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"entity": "StockItem", "predicates": [{{"field": "ClosingStock", "op": "<", "value": 10}}]}}"#
        )
        .unwrap();

        let fs = read_filter_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(fs.entity, "StockItem");
        assert_eq!(fs.predicates[0].op, "<");
    }

    #[test]
    fn test_missing_filter_file() {
        let err = read_filter_file("/nonexistent/filters.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read filter file"));
    }
}
