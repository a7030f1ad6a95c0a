//! Canonical, parameterized query form.
//!
//! A [`CanonicalQuery`] only ever holds schema names and typed parameter
//! values. Rendering it to statement text emits schema names and `?`
//! placeholders, nothing else.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::Entity;

/// Operators of the request language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    Between,
    StartsWith,
    In,
    Like,
    Contains,
}

/// Operator families the whitelist reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    Equality,
    Range,
    Prefix,
    Set,
    Pattern,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Operator> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Operator::Eq,
            "!=" | "<>" | "ne" | "neq" => Operator::NotEq,
            ">" | "gt" => Operator::Gt,
            ">=" | "gte" => Operator::GtEq,
            "<" | "lt" => Operator::Lt,
            "<=" | "lte" => Operator::LtEq,
            "between" => Operator::Between,
            "starts_with" | "prefix" => Operator::StartsWith,
            "in" => Operator::In,
            "like" => Operator::Like,
            "contains" => Operator::Contains,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Between => "between",
            Operator::StartsWith => "starts_with",
            Operator::In => "in",
            Operator::Like => "like",
            Operator::Contains => "contains",
        }
    }

    pub fn class(&self) -> OperatorClass {
        match self {
            Operator::Eq | Operator::NotEq => OperatorClass::Equality,
            Operator::Gt | Operator::GtEq | Operator::Lt | Operator::LtEq | Operator::Between => {
                OperatorClass::Range
            }
            Operator::StartsWith => OperatorClass::Prefix,
            Operator::In => OperatorClass::Set,
            Operator::Like | Operator::Contains => OperatorClass::Pattern,
        }
    }

    /// Number of parameters the operator takes; `None` for variadic `in`.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Operator::Between => Some(2),
            Operator::In => None,
            _ => Some(1),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed positional parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
    Bool(bool),
}

impl ParamValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Text(s) => serde_json::Value::String(s.clone()),
            ParamValue::Decimal(d) => serde_json::Value::String(d.to_string()),
            ParamValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            ParamValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "'{}'", s),
            ParamValue::Decimal(d) => write!(f, "{}", d),
            ParamValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ParamValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One predicate with its parameters. Parameters never appear in statement text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: Operator,
    pub params: Vec<ParamValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "bound", content = "date", rename_all = "snake_case")]
pub enum Bound {
    Open,
    Inclusive(NaiveDate),
}

impl Bound {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Bound::Open => None,
            Bound::Inclusive(d) => Some(*d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalDateRange {
    pub field: String,
    pub from: Bound,
    pub to: Bound,
}

impl CanonicalDateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let after_start = self.from.date().map_or(true, |from| date >= from);
        let before_end = self.to.date().map_or(true, |to| date <= to);
        after_start && before_end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Validated-shape query ready for whitelist checks and execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalQuery {
    pub entity: Entity,
    pub fields: Vec<String>,
    pub predicates: Vec<Predicate>,
    pub date_range: Option<CanonicalDateRange>,
    pub order_by: Option<SortKey>,
    pub limit: usize,
    pub company: Option<String>,
}

/// Statement text plus its positional parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<ParamValue>,
    pub max_rows: usize,
}

impl CanonicalQuery {
    /// Render to the engine's SQL dialect.
    ///
    /// The limit is a validated integer, so it is the only value rendered inline.
    /// It is also carried as `max_rows` for drivers that ignore `LIMIT`.
    pub fn to_statement(&self) -> Statement {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        let projection: Vec<String> = self.fields.iter().map(|f| format!("${}", f)).collect();
        sql.push_str(&projection.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(self.entity.as_str());

        let mut clauses = Vec::new();
        for predicate in &self.predicates {
            clauses.push(render_predicate(predicate, &mut params));
        }
        if let Some(range) = &self.date_range {
            if let Some(from) = range.from.date() {
                clauses.push(format!("${} >= ?", range.field));
                params.push(ParamValue::Date(from));
            }
            if let Some(to) = range.to.date() {
                clauses.push(format!("${} <= ?", range.field));
                params.push(ParamValue::Date(to));
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some(order) = &self.order_by {
            sql.push_str(&format!(" ORDER BY ${}", order.field));
            if order.descending {
                sql.push_str(" DESC");
            }
        }
        sql.push_str(&format!(" LIMIT {}", self.limit));

        Statement {
            sql,
            params,
            max_rows: self.limit,
        }
    }
}

fn render_predicate(predicate: &Predicate, params: &mut Vec<ParamValue>) -> String {
    let field = format!("${}", predicate.field);
    match predicate.op {
        Operator::Between => {
            params.extend(predicate.params.iter().cloned());
            format!("{} BETWEEN ? AND ?", field)
        }
        Operator::In => {
            params.extend(predicate.params.iter().cloned());
            let placeholders = vec!["?"; predicate.params.len()].join(", ");
            format!("{} IN ({})", field, placeholders)
        }
        Operator::StartsWith | Operator::Contains => {
            for p in &predicate.params {
                let escaped = match p {
                    ParamValue::Text(s) => escape_like(s),
                    other => escape_like(&other.to_string()),
                };
                let pattern = if predicate.op == Operator::StartsWith {
                    format!("{}%", escaped)
                } else {
                    format!("%{}%", escaped)
                };
                params.push(ParamValue::Text(pattern));
            }
            format!("{} LIKE ? ESCAPE '\\'", field)
        }
        Operator::Like => {
            params.extend(predicate.params.iter().cloned());
            format!("{} LIKE ?", field)
        }
        op => {
            params.extend(predicate.params.iter().cloned());
            let sym = match op {
                Operator::NotEq => "<>",
                other => other.as_str(),
            };
            format!("{} {} ?", field, sym)
        }
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voucher_query() -> CanonicalQuery {
        CanonicalQuery {
            entity: Entity::Voucher,
            fields: vec!["Date".into(), "Amount".into()],
            predicates: vec![
                Predicate {
                    field: "VoucherType".into(),
                    op: Operator::Eq,
                    params: vec![ParamValue::Text("Sales".into())],
                },
                Predicate {
                    field: "PartyName".into(),
                    op: Operator::StartsWith,
                    params: vec![ParamValue::Text("50%_Off".into())],
                },
            ],
            date_range: Some(CanonicalDateRange {
                field: "Date".into(),
                from: Bound::Inclusive(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()),
                to: Bound::Open,
            }),
            order_by: Some(SortKey {
                field: "Date".into(),
                descending: true,
            }),
            limit: 100,
            company: None,
        }
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("<>"), Some(Operator::NotEq));
        assert_eq!(Operator::parse(" BETWEEN "), Some(Operator::Between));
        assert_eq!(Operator::parse("~"), None);
        assert_eq!(Operator::Like.class(), OperatorClass::Pattern);
    }

    #[test]
    fn test_statement_has_only_placeholders() {
        let stmt = voucher_query().to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT $Date, $Amount FROM Voucher WHERE $VoucherType = ? AND $PartyName LIKE ? ESCAPE '\\' AND $Date >= ? ORDER BY $Date DESC LIMIT 100"
        );
        assert!(!stmt.sql.contains("Sales"));
        assert_eq!(stmt.params.len(), 3);
        assert_eq!(stmt.params[1], ParamValue::Text("50\\%\\_Off%".into()));
        assert_eq!(stmt.max_rows, 100);
    }

    #[test]
    fn test_in_placeholders() {
        let mut q = voucher_query();
        q.predicates = vec![Predicate {
            field: "VoucherType".into(),
            op: Operator::In,
            params: vec![
                ParamValue::Text("Receipt".into()),
                ParamValue::Text("Payment".into()),
            ],
        }];
        q.date_range = None;
        q.order_by = None;
        let stmt = q.to_statement();
        assert!(stmt.sql.ends_with("WHERE $VoucherType IN (?, ?) LIMIT 100"));
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_date_range_contains() {
        let range = CanonicalDateRange {
            field: "Date".into(),
            from: Bound::Inclusive(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            to: Bound::Inclusive(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
        };
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
    }
}
