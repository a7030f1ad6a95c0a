//! HTTP gateway source.
//!
//! Talks to a small bridge process that sits next to the accounting engine and
//! forwards parameterized statements to its ODBC driver.
//!
//! - Session open: `GET {base}/health`
//! - Execute: `POST {base}/query` with `{sql, params, max_rows, company}`, answered by `{columns, rows}`
//!
//! Request timeouts are execution timeouts. Other network failures and 5xx
//! answers are connectivity losses. 4xx answers and malformed bodies are
//! protocol errors.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tallygate_common::config::{ExecutionSettings, SourceSettings};
use tallygate_common::models::RowSet;
use tallygate_error::{ErrorCode, ErrorContext, GateError};
use tallygate_sql::CanonicalQuery;
use tracing::debug;

use super::{Connector, SourceProvider, SourceSession};
use crate::error::{ConnectError, ExecutionError};

#[derive(Debug, Serialize)]
struct QueryPayload<'a> {
    sql: &'a str,
    params: Vec<serde_json::Value>,
    max_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryAnswer {
    columns: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: Option<SecretString>,
}

pub struct GatewayConnector {
    name: String,
    base_url: String,
    client: Client,
    request_timeout: Duration,
    credentials: Option<Credentials>,
}

impl GatewayConnector {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, GateError> {
        let parsed = Url::parse(base_url).map_err(|e| {
            GateError::new(
                ErrorCode::InvalidConfig,
                format!("Invalid gateway url '{}': {}", base_url, e),
            )
            .with_context(ErrorContext::Config {
                file_path: None,
                field: Some("source.url".to_string()),
            })
        })?;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                GateError::new(
                    ErrorCode::Internal,
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            name: name.into(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            client,
            request_timeout,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, username: String, password: Option<SecretString>) -> Self {
        self.credentials = Some(Credentials { username, password });
        self
    }
}

#[async_trait]
impl Connector for GatewayConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<Box<dyn SourceSession>, ConnectError> {
        let mut session = GatewaySession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            timeout_ms: self.request_timeout.as_millis() as u64,
            credentials: self.credentials.clone(),
        };
        session.health().await.map_err(|e| match e {
            ExecutionError::ProtocolError(reason) => ConnectError::Rejected(reason),
            other => ConnectError::Unreachable(other.to_string()),
        })?;
        debug!(target: "pool", source = %self.name, "Gateway session opened");
        Ok(Box::new(session))
    }
}

struct GatewaySession {
    client: Client,
    base_url: String,
    timeout_ms: u64,
    credentials: Option<Credentials>,
}

impl GatewaySession {
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(
                &c.username,
                c.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => request,
        }
    }

    async fn health(&mut self) -> Result<(), ExecutionError> {
        let request = self.authorize(self.client.get(format!("{}/health", self.base_url)));
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        check_status(response.status())
    }

    fn transport_error(&self, err: reqwest::Error) -> ExecutionError {
        if err.is_timeout() {
            ExecutionError::Timeout {
                after_ms: self.timeout_ms,
            }
        } else {
            ExecutionError::ConnectivityLost(err.to_string())
        }
    }
}

#[async_trait]
impl SourceSession for GatewaySession {
    async fn execute(&mut self, query: &CanonicalQuery) -> Result<RowSet, ExecutionError> {
        let statement = query.to_statement();
        let payload = QueryPayload {
            sql: &statement.sql,
            params: statement.params.iter().map(|p| p.to_json()).collect(),
            max_rows: statement.max_rows,
            company: query.company.as_deref(),
        };

        let request = self.authorize(
            self.client
                .post(format!("{}/query", self.base_url))
                .json(&payload),
        );
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        check_status(response.status())?;

        let answer: QueryAnswer = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                ExecutionError::ProtocolError(format!("malformed response body: {}", e))
            }
        })?;

        if answer.rows.iter().any(|r| r.len() != answer.columns.len()) {
            return Err(ExecutionError::ProtocolError(
                "row width does not match column count".to_string(),
            ));
        }

        let mut rows = answer.rows;
        rows.truncate(statement.max_rows);
        Ok(RowSet {
            columns: answer.columns,
            rows,
        })
    }

    async fn ping(&mut self) -> Result<(), ExecutionError> {
        self.health().await
    }
}

fn check_status(status: StatusCode) -> Result<(), ExecutionError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        Err(ExecutionError::ConnectivityLost(format!(
            "gateway answered {}",
            status
        )))
    } else {
        Err(ExecutionError::ProtocolError(format!(
            "gateway answered {}",
            status
        )))
    }
}

pub struct GatewaySourceProvider;

#[async_trait]
impl SourceProvider for GatewaySourceProvider {
    fn type_name(&self) -> &'static str {
        "gateway"
    }

    async fn create(
        &self,
        source: &SourceSettings,
        execution: &ExecutionSettings,
    ) -> Result<Arc<dyn Connector>, GateError> {
        let url = source.url.as_deref().ok_or_else(|| {
            GateError::new(
                ErrorCode::InvalidConfig,
                "source.url is required for gateway sources",
            )
            .with_context(ErrorContext::Config {
                file_path: None,
                field: Some("source.url".to_string()),
            })
        })?;

        let mut connector = GatewayConnector::new(
            source.name.clone(),
            url,
            Duration::from_millis(execution.timeout_ms),
        )?;
        if let Some(username) = &source.username {
            connector = connector.with_credentials(username.clone(), source.password.clone());
        }
        Ok(Arc::new(connector))
    }
}
