//! In-memory fixture source.
//!
//! Loads per-company tables from a YAML or JSON file and evaluates canonical
//! queries directly against them. Used for offline development, demos and tests.
//!
//! ```yaml
//! companies:
//!   - name: Acme Traders
//!     tables:
//!       Ledger:
//!         - { Name: Cash, Parent: Cash-in-Hand, ClosingBalance: 12000 }
//!       Voucher:
//!         - { Date: 2024-04-02, VoucherType: Sales, Amount: 5000, PartyName: Ravi Stores }
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tallygate_common::config::{ExecutionSettings, SourceSettings};
use tallygate_common::models::RowSet;
use tallygate_error::{ErrorCode, ErrorContext, GateError};
use tallygate_sql::canonical::{Operator, Predicate};
use tallygate_sql::{CanonicalQuery, DataType, Entity, ParamValue};
use tracing::debug;

use super::{Connector, SourceProvider, SourceSession};
use crate::error::{ConnectError, ExecutionError};

pub type FixtureRow = Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureData {
    #[serde(default)]
    pub companies: Vec<FixtureCompany>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureCompany {
    pub name: String,
    #[serde(default)]
    pub tables: BTreeMap<Entity, Vec<FixtureRow>>,
}

impl FixtureData {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GateError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub async fn from_path(path: &str) -> Result<Self, GateError> {
        let with_path = |e: GateError| {
            GateError::new(ErrorCode::InvalidFixture, e.message).with_context(ErrorContext::Config {
                file_path: Some(path.to_string()),
                field: None,
            })
        };

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| with_path(e.into()))?;
        let is_json = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&raw).map_err(|e| with_path(e.into()))
        } else {
            Self::from_yaml_str(&raw).map_err(with_path)
        }
    }

    fn company(&self, name: Option<&str>) -> Option<&FixtureCompany> {
        match name {
            Some(name) => self
                .companies
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name)),
            None => self.companies.first(),
        }
    }

    /// One row per loaded company. A company without a `Company` table gets a row with its name.
    fn company_rows(&self) -> Vec<FixtureRow> {
        self.companies
            .iter()
            .flat_map(|c| match c.tables.get(&Entity::Company) {
                Some(rows) if !rows.is_empty() => rows.clone(),
                _ => {
                    let mut row = Map::new();
                    row.insert("Name".to_string(), Value::String(c.name.clone()));
                    vec![row]
                }
            })
            .collect()
    }
}

pub struct FixtureConnector {
    name: String,
    data: Arc<FixtureData>,
}

impl FixtureConnector {
    pub fn new(name: impl Into<String>, data: FixtureData) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data),
        }
    }
}

#[async_trait]
impl Connector for FixtureConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<Box<dyn SourceSession>, ConnectError> {
        Ok(Box::new(FixtureSession {
            data: self.data.clone(),
        }))
    }
}

struct FixtureSession {
    data: Arc<FixtureData>,
}

#[async_trait]
impl SourceSession for FixtureSession {
    async fn execute(&mut self, query: &CanonicalQuery) -> Result<RowSet, ExecutionError> {
        let rows = if query.entity == Entity::Company {
            self.data.company_rows()
        } else {
            let company = self
                .data
                .company(query.company.as_deref())
                .ok_or_else(|| {
                    ExecutionError::ProtocolError(format!(
                        "company '{}' is not loaded",
                        query.company.as_deref().unwrap_or_default()
                    ))
                })?;
            company
                .tables
                .get(&query.entity)
                .cloned()
                .unwrap_or_default()
        };

        let result = evaluate(query, rows);
        debug!(entity = %query.entity, rows = result.rows.len(), "Fixture query evaluated");
        Ok(result)
    }

    async fn ping(&mut self) -> Result<(), ExecutionError> {
        Ok(())
    }
}

/// Apply predicates, date range, ordering, limit and projection.
pub fn evaluate(query: &CanonicalQuery, rows: Vec<FixtureRow>) -> RowSet {
    let table = query.entity.table();
    let type_of = |field: &str| {
        table
            .column(field)
            .map(|c| c.data_type)
            .unwrap_or(DataType::String)
    };

    let mut matched: Vec<FixtureRow> = rows
        .into_iter()
        .filter(|row| {
            query.predicates.iter().all(|p| {
                let value = row.get(&p.field).and_then(|v| typed(v, type_of(&p.field)));
                value.is_some_and(|v| matches_predicate(&v, p))
            })
        })
        .filter(|row| match &query.date_range {
            None => true,
            Some(range) => match row.get(&range.field).and_then(|v| typed(v, DataType::Date)) {
                Some(ParamValue::Date(d)) => range.contains(d),
                _ => false,
            },
        })
        .collect();

    if let Some(order) = &query.order_by {
        let dt = type_of(&order.field);
        matched.sort_by(|a, b| {
            let va = a.get(&order.field).and_then(|v| typed(v, dt));
            let vb = b.get(&order.field).and_then(|v| typed(v, dt));
            let ord = match (&va, &vb) {
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if order.descending && va.is_some() && vb.is_some() {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    matched.truncate(query.limit);

    RowSet {
        columns: query.fields.clone(),
        rows: matched
            .into_iter()
            .map(|row| {
                query
                    .fields
                    .iter()
                    .map(|f| row.get(f).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect(),
    }
}

fn typed(value: &Value, data_type: DataType) -> Option<ParamValue> {
    match (data_type, value) {
        (_, Value::Null) => None,
        (DataType::String, Value::String(s)) => Some(ParamValue::Text(s.clone())),
        (DataType::String, other) => Some(ParamValue::Text(other.to_string())),
        (DataType::Decimal, Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok()
            .map(ParamValue::Decimal),
        (DataType::Decimal, Value::String(s)) => {
            Decimal::from_str(s.trim()).ok().map(ParamValue::Decimal)
        }
        (DataType::Date, Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .map(ParamValue::Date),
        (DataType::Boolean, Value::Bool(b)) => Some(ParamValue::Bool(*b)),
        (DataType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Some(ParamValue::Bool(true)),
            "no" | "false" => Some(ParamValue::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Text compares case-insensitively, like the engine's name lookups.
fn compare(a: &ParamValue, b: &ParamValue) -> Option<Ordering> {
    match (a, b) {
        (ParamValue::Text(x), ParamValue::Text(y)) => {
            Some(x.to_lowercase().cmp(&y.to_lowercase()))
        }
        (ParamValue::Decimal(x), ParamValue::Decimal(y)) => Some(x.cmp(y)),
        (ParamValue::Date(x), ParamValue::Date(y)) => Some(x.cmp(y)),
        (ParamValue::Bool(x), ParamValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches_predicate(value: &ParamValue, predicate: &Predicate) -> bool {
    let params = &predicate.params;
    let cmp_first = || params.first().and_then(|p| compare(value, p));
    let text = |v: &ParamValue| match v {
        ParamValue::Text(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };

    match predicate.op {
        Operator::Eq => cmp_first() == Some(Ordering::Equal),
        Operator::NotEq => cmp_first().is_some_and(|o| o != Ordering::Equal),
        Operator::Gt => cmp_first() == Some(Ordering::Greater),
        Operator::GtEq => cmp_first().is_some_and(|o| o != Ordering::Less),
        Operator::Lt => cmp_first() == Some(Ordering::Less),
        Operator::LtEq => cmp_first().is_some_and(|o| o != Ordering::Greater),
        Operator::Between => match (params.first(), params.get(1)) {
            (Some(lo), Some(hi)) => {
                compare(value, lo).is_some_and(|o| o != Ordering::Less)
                    && compare(value, hi).is_some_and(|o| o != Ordering::Greater)
            }
            _ => false,
        },
        Operator::In => params
            .iter()
            .any(|p| compare(value, p) == Some(Ordering::Equal)),
        Operator::StartsWith => params.first().is_some_and(|p| text(value).starts_with(&text(p))),
        Operator::Contains => params.first().is_some_and(|p| text(value).contains(&text(p))),
        Operator::Like => params.first().is_some_and(|p| like(&text(value), &text(p))),
    }
}

/// SQL `LIKE` with `%` and `_` wildcards.
fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let mut dp = vec![vec![false; v.len() + 1]; p.len() + 1];
    dp[0][0] = true;
    for i in 1..=p.len() {
        if p[i - 1] == '%' {
            dp[i][0] = dp[i - 1][0];
        }
        for j in 1..=v.len() {
            dp[i][j] = match p[i - 1] {
                '%' => dp[i - 1][j] || dp[i][j - 1],
                '_' => dp[i - 1][j - 1],
                c => dp[i - 1][j - 1] && c == v[j - 1],
            };
        }
    }
    dp[p.len()][v.len()]
}

pub struct FixtureSourceProvider;

#[async_trait]
impl SourceProvider for FixtureSourceProvider {
    fn type_name(&self) -> &'static str {
        "fixture"
    }

    async fn create(
        &self,
        source: &SourceSettings,
        _execution: &ExecutionSettings,
    ) -> Result<Arc<dyn Connector>, GateError> {
        let path = source.fixture_path.as_deref().ok_or_else(|| {
            GateError::new(
                ErrorCode::InvalidConfig,
                "source.fixture_path is required for fixture sources",
            )
            .with_context(ErrorContext::Config {
                file_path: None,
                field: Some("source.fixture_path".to_string()),
            })
        })?;
        let data = FixtureData::from_path(path).await?;
        Ok(Arc::new(FixtureConnector::new(source.name.clone(), data)))
    }
}
