//! Structured filter set to canonical query.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tallygate_common::config::DEFAULT_LIMIT;
use tallygate_common::models::{FilterSet, PredicateSpec};
use tallygate_error::{find_closest_match, ErrorCode, ErrorContext, GateError};
use thiserror::Error;

use crate::canonical::{
    Bound, CanonicalDateRange, CanonicalQuery, Operator, ParamValue, Predicate, SortKey,
};
use crate::schema::{ColumnSchema, DataType, Entity, TableSchema};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("Unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    #[error("Unknown field '{field}' on {entity}")]
    UnknownField { entity: Entity, field: String },

    #[error("Value for '{field}' is not a valid {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("Unsupported operator '{operator}'")]
    UnsupportedOperator { operator: String },

    #[error("Invalid date range: {reason}")]
    InvalidDateRange { reason: String },
}

impl BuildError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BuildError::UnknownEntity { .. } => ErrorCode::UnknownEntity,
            BuildError::UnknownField { .. } => ErrorCode::UnknownField,
            BuildError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            BuildError::UnsupportedOperator { .. } => ErrorCode::UnsupportedOperator,
            BuildError::InvalidDateRange { .. } => ErrorCode::InvalidDateRange,
        }
    }
}

impl From<BuildError> for GateError {
    fn from(err: BuildError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            BuildError::UnknownEntity { entity } => {
                let available = Entity::names();
                let hint = match find_closest_match(&entity, &available) {
                    Some(s) => format!("Did you mean '{}'?", s),
                    None => format!("Available entities: {}", available.join(", ")),
                };
                GateError::new(code, message)
                    .with_context(ErrorContext::UnknownEntity {
                        entity,
                        available_entities: available,
                    })
                    .with_hint(hint)
            }
            BuildError::UnknownField { entity, field } => {
                let available = entity.table().column_names();
                let mut error = GateError::new(code, message);
                if let Some(s) = find_closest_match(&field, &available) {
                    error = error.with_hint(format!("Did you mean '{}'?", s));
                }
                error.with_context(ErrorContext::UnknownField {
                    field,
                    entity: entity.to_string(),
                    available_fields: available,
                })
            }
            BuildError::TypeMismatch { field, expected } => GateError::new(code, message)
                .with_context(ErrorContext::TypeMismatch { field, expected }),
            BuildError::UnsupportedOperator { .. } => GateError::new(code, message).with_hint(
                "Use one of =, !=, >, >=, <, <=, between, starts_with, in",
            ),
            BuildError::InvalidDateRange { .. } => GateError::new(code, message),
        }
    }
}

/// Resolves a [`FilterSet`] against the schema table.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    default_limit: usize,
    default_company: Option<String>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl QueryBuilder {
    pub fn new(default_limit: usize) -> Self {
        Self {
            default_limit,
            default_company: None,
        }
    }

    /// Company applied when a filter set names none.
    pub fn with_default_company(mut self, company: Option<String>) -> Self {
        self.default_company = company;
        self
    }

    pub fn build(&self, filters: &FilterSet) -> Result<CanonicalQuery, BuildError> {
        let entity = Entity::parse(&filters.entity).ok_or_else(|| BuildError::UnknownEntity {
            entity: filters.entity.clone(),
        })?;
        let table = entity.table();

        let mut fields: Vec<String> = Vec::new();
        if filters.fields.is_empty() {
            fields.extend(table.default_projection.iter().map(|f| f.to_string()));
        } else {
            for name in &filters.fields {
                let column = resolve(table, name)?;
                if !fields.iter().any(|f| f == column.name) {
                    fields.push(column.name.to_string());
                }
            }
        }

        let predicates = filters
            .predicates
            .iter()
            .map(|spec| build_predicate(table, spec))
            .collect::<Result<Vec<_>, _>>()?;

        let date_range = match &filters.date_range {
            None => None,
            Some(range) if range.from.is_none() && range.to.is_none() => None,
            Some(range) => {
                let field = table.date_column.ok_or_else(|| BuildError::InvalidDateRange {
                    reason: format!("{} has no date column", entity),
                })?;
                if let (Some(from), Some(to)) = (range.from, range.to) {
                    if from > to {
                        return Err(BuildError::InvalidDateRange {
                            reason: format!("{} is after {}", from, to),
                        });
                    }
                }
                Some(CanonicalDateRange {
                    field: field.to_string(),
                    from: range.from.map_or(Bound::Open, Bound::Inclusive),
                    to: range.to.map_or(Bound::Open, Bound::Inclusive),
                })
            }
        };

        let order_by = match &filters.order_by {
            Some(order) => Some(SortKey {
                field: resolve(table, &order.field)?.name.to_string(),
                descending: order.descending,
            }),
            None => None,
        };

        Ok(CanonicalQuery {
            entity,
            fields,
            predicates,
            date_range,
            order_by,
            limit: filters.limit.unwrap_or(self.default_limit),
            company: filters
                .company
                .clone()
                .or_else(|| self.default_company.clone()),
        })
    }
}

fn resolve(table: &TableSchema, name: &str) -> Result<&'static ColumnSchema, BuildError> {
    table.column(name).ok_or_else(|| BuildError::UnknownField {
        entity: table.entity,
        field: name.to_string(),
    })
}

fn build_predicate(table: &TableSchema, spec: &PredicateSpec) -> Result<Predicate, BuildError> {
    let column = resolve(table, &spec.field)?;
    let op = Operator::parse(&spec.op).ok_or_else(|| BuildError::UnsupportedOperator {
        operator: spec.op.clone(),
    })?;

    let params = match op.arity() {
        Some(1) => vec![coerce(column, &spec.value)?],
        Some(n) => {
            let items = spec.value.as_array().filter(|a| a.len() == n).ok_or_else(|| {
                BuildError::TypeMismatch {
                    field: column.name.to_string(),
                    expected: format!("list of {} {} values", n, column.data_type),
                }
            })?;
            items
                .iter()
                .map(|v| coerce(column, v))
                .collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let items = spec
                .value
                .as_array()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| BuildError::TypeMismatch {
                    field: column.name.to_string(),
                    expected: format!("non-empty list of {} values", column.data_type),
                })?;
            items
                .iter()
                .map(|v| coerce(column, v))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(Predicate {
        field: column.name.to_string(),
        op,
        params,
    })
}

/// Coerce a JSON literal to the column's declared type.
fn coerce(column: &ColumnSchema, value: &Value) -> Result<ParamValue, BuildError> {
    let mismatch = || BuildError::TypeMismatch {
        field: column.name.to_string(),
        expected: column.data_type.to_string(),
    };

    match column.data_type {
        DataType::String => match value {
            Value::String(s) => Ok(ParamValue::Text(s.clone())),
            _ => Err(mismatch()),
        },
        DataType::Decimal => {
            let parsed = match value {
                Value::Number(n) => Decimal::from_str(&n.to_string())
                    .or_else(|_| Decimal::from_scientific(&n.to_string())),
                Value::String(s) => Decimal::from_str(s.trim()),
                _ => return Err(mismatch()),
            };
            parsed
                .map(|d| ParamValue::Decimal(d.normalize()))
                .map_err(|_| mismatch())
        }
        DataType::Date => match value {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(ParamValue::Date)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Boolean => match value {
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" => Ok(ParamValue::Bool(true)),
                "no" | "false" => Ok(ParamValue::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
    }
}
