//! Request and response shapes crossing the mediation boundary.
//!
//! Everything here is plain data. Entity and field names are untrusted strings
//! until the query builder resolves them against the schema table.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tallygate_error::{ErrorCode, ErrorContext, GateError};

/// A structured request for one entity.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub entity: String,

    /// Projection. Empty means the entity's default projection.
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub predicates: Vec<PredicateSpec>,

    #[serde(default)]
    pub date_range: Option<DateRange>,

    #[serde(default)]
    pub order_by: Option<OrderBy>,

    #[serde(default)]
    pub limit: Option<usize>,

    /// Company to run against. Falls back to the configured company.
    #[serde(default)]
    pub company: Option<String>,
}

impl FilterSet {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn predicate(
        mut self,
        field: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.predicates.push(PredicateSpec {
            field: field.into(),
            op: op.into(),
            value: value.into(),
        });
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_range = Some(DateRange { from, to });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One `(field, operator, value)` triple as received. `op` is parsed by the builder.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredicateSpec {
    pub field: String,
    #[serde(default = "default_op")]
    pub op: String,
    pub value: serde_json::Value,
}

fn default_op() -> String {
    "=".to_string()
}

/// Inclusive date window. Either side may be open.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// The inbound union: free text or an explicit filter set.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum QueryRequest {
    Text(TextQuery),
    Structured(FilterSet),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TextQuery {
    pub query_text: String,
    #[serde(default)]
    pub context: RequestContext,
    #[serde(default)]
    pub filters: Option<DashboardFilters>,
}

/// Caller context that narrows intent parameters.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RequestContext {
    #[serde(default)]
    pub company: Option<String>,
    /// Anchor for relative dates. Defaults to the local date.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

/// Structured filters set by the dashboard. They override windows found in text.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DashboardFilters {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub voucher_type: Option<String>,
    #[serde(default)]
    pub ledger_group: Option<String>,
}

/// Tabular rows as returned by a source.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Payload of a successful response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseData {
    Rows(RowSet),
    Aggregate(Aggregate),
    Dashboard(Dashboard),
}

/// Sections computed for one dashboard refresh. A failed section keeps its
/// own error and does not fail the others.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Dashboard {
    pub sections: Vec<DashboardSection>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DashboardSection {
    pub name: String,
    pub response: QueryResponse,
}

impl Dashboard {
    pub fn section(&self, name: &str) -> Option<&QueryResponse> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.response)
    }

    pub fn failed(&self) -> usize {
        self.sections.iter().filter(|s| !s.response.success).count()
    }
}

/// Aggregate computed in-process from fetched rows.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Aggregate {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<AggregateRow>,
    pub summary: BTreeMap<String, Decimal>,
    /// Rows fetched from the source to compute this aggregate.
    pub source_rows: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AggregateRow {
    pub label: String,
    pub values: Vec<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
}

/// Chart-ready series handed to the rendering layer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChartData {
    pub chart_type: ChartType,
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Outcome of one request. Built once, never mutated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueryResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_context: Option<ErrorContext>,
    /// Pipeline stage a failed request stopped in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Short fingerprint of the failed canonical query, as logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default)]
    pub cache_hit: bool,
    pub execution_time_ms: u64,
}

impl QueryResponse {
    pub fn success(
        message: impl Into<String>,
        data: ResponseData,
        chart_data: Option<ChartData>,
        cache_hit: bool,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            chart_data,
            error_code: None,
            hint: None,
            error_context: None,
            stage: None,
            query_id: None,
            retryable: false,
            cache_hit,
            execution_time_ms,
        }
    }

    pub fn failure(error: GateError, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            retryable: error.is_retryable(),
            message: error.message,
            data: None,
            chart_data: None,
            error_code: Some(error.code),
            hint: error.hint,
            error_context: error.context,
            stage: error.stage,
            query_id: error.query_id,
            cache_hit: false,
            execution_time_ms,
        }
    }

    /// Rows of a successful row response.
    pub fn rows(&self) -> Option<&RowSet> {
        match &self.data {
            Some(ResponseData::Rows(rows)) => Some(rows),
            _ => None,
        }
    }

    pub fn aggregate(&self) -> Option<&Aggregate> {
        match &self.data {
            Some(ResponseData::Aggregate(agg)) => Some(agg),
            _ => None,
        }
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        match &self.data {
            Some(ResponseData::Dashboard(dashboard)) => Some(dashboard),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_union_text() {
        let req: QueryRequest = serde_json::from_value(json!({
            "query_text": "top 5 customers",
            "context": { "company": "Acme Traders" }
        }))
        .unwrap();
        match req {
            QueryRequest::Text(t) => {
                assert_eq!(t.query_text, "top 5 customers");
                assert_eq!(t.context.company.as_deref(), Some("Acme Traders"));
                assert!(t.filters.is_none());
            }
            QueryRequest::Structured(_) => panic!("expected text request"),
        }
    }

    #[test]
    fn test_request_union_structured() {
        let req: QueryRequest = serde_json::from_value(json!({
            "entity": "Voucher",
            "predicates": [{ "field": "VoucherType", "value": "Sales" }],
            "date_range": { "from": "2024-04-01", "to": null },
            "limit": 50
        }))
        .unwrap();
        match req {
            QueryRequest::Structured(fs) => {
                assert_eq!(fs.entity, "Voucher");
                assert_eq!(fs.predicates[0].op, "=");
                assert_eq!(
                    fs.date_range.unwrap().from,
                    NaiveDate::from_ymd_opt(2024, 4, 1)
                );
                assert_eq!(fs.limit, Some(50));
            }
            QueryRequest::Text(_) => panic!("expected structured request"),
        }
    }

    #[test]
    fn test_failure_response_carries_code() {
        let err = GateError::new(ErrorCode::PoolTimeout, "no session available")
            .at_stage("acquiring")
            .for_query("9c1e4b7a02");
        let resp = QueryResponse::failure(err, 12);
        assert!(!resp.success);
        assert!(resp.retryable);
        assert_eq!(resp.error_code, Some(ErrorCode::PoolTimeout));
        assert_eq!(resp.stage.as_deref(), Some("acquiring"));
        assert_eq!(resp.query_id.as_deref(), Some("9c1e4b7a02"));

        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["error_code"], "TG-1001");
        assert!(v.get("data").is_none());
    }

    #[test]
    fn test_response_data_tagged() {
        let data = ResponseData::Rows(RowSet {
            columns: vec!["Name".into()],
            rows: vec![vec![json!("Cash")]],
        });
        let v = serde_json::to_value(&data).unwrap();
        assert_eq!(v["kind"], "rows");
        assert_eq!(v["columns"][0], "Name");
    }
}
