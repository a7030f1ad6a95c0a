//! Data source abstractions and implementations.
//!
//! A [`Connector`] opens [`SourceSession`]s against the accounting engine. The
//! connection pool owns sessions and lends them to one query at a time.
//!
//! # Supported Sources
//!
//! | Source Type | Implementation | Description |
//! |-------------|----------------|-------------|
//! | `fixture`   | `FixtureConnector` | In-memory tables loaded from YAML/JSON, for offline use and tests |
//! | `gateway`   | `GatewayConnector` | HTTP bridge in front of the engine's ODBC driver |
//!
//! # Adding a New Source
//!
//! 1. Implement `Connector` and `SourceSession`.
//! 2. Implement `SourceProvider` to build the connector from `SourceSettings`.
//! 3. Register the provider in `default_registry` in this module.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tallygate_common::config::{ExecutionSettings, SourceSettings};
use tallygate_common::models::RowSet;
use tallygate_error::{ErrorCode, ErrorContext, GateError};
use tallygate_sql::CanonicalQuery;

use crate::error::{ConnectError, ExecutionError};

pub mod fixture;
pub mod gateway;

/// One live connection. Used by exactly one query at a time.
#[async_trait]
pub trait SourceSession: Send {
    /// Run a validated query. Parameters travel separately from statement text.
    async fn execute(&mut self, query: &CanonicalQuery) -> Result<RowSet, ExecutionError>;

    /// Cheap liveness check.
    async fn ping(&mut self) -> Result<(), ExecutionError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Configured source name, used in logs and error context.
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<Box<dyn SourceSession>, ConnectError>;
}

#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Returns the type of source this provider handles (e.g., "fixture", "gateway")
    fn type_name(&self) -> &'static str;

    async fn create(
        &self,
        source: &SourceSettings,
        execution: &ExecutionSettings,
    ) -> Result<Arc<dyn Connector>, GateError>;
}

#[derive(Default)]
pub struct SourceRegistry {
    providers: HashMap<&'static str, Box<dyn SourceProvider>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_provider(&mut self, provider: Box<dyn SourceProvider>) {
        self.providers.insert(provider.type_name(), provider);
    }

    pub async fn create_connector(
        &self,
        source: &SourceSettings,
        execution: &ExecutionSettings,
    ) -> Result<Arc<dyn Connector>, GateError> {
        match self.providers.get(source.source_type.as_str()) {
            Some(provider) => provider.create(source, execution).await,
            None => {
                let mut available: Vec<&str> = self.providers.keys().copied().collect();
                available.sort_unstable();
                Err(GateError::new(
                    ErrorCode::UnsupportedSourceType,
                    format!("No provider found for source type: {}", source.source_type),
                )
                .with_context(ErrorContext::Config {
                    file_path: None,
                    field: Some("source.type".to_string()),
                })
                .with_hint(format!("Supported types: {}", available.join(", "))))
            }
        }
    }
}

pub fn default_registry() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register_provider(Box::new(fixture::FixtureSourceProvider));
    registry.register_provider(Box::new(gateway::GatewaySourceProvider));
    registry
}
