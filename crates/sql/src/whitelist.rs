//! Whitelist validation of canonical queries.
//!
//! [`validate`] is pure: no I/O, no clock, same input same verdict.

use tallygate_common::scrubber::scrub_truncated;
use tallygate_error::{ErrorCode, ErrorContext, GateError};
use thiserror::Error;

use crate::canonical::{CanonicalQuery, Operator, OperatorClass};
use crate::schema::{DataType, Entity};

/// Hard ceiling on rows per query. Larger limits are rejected, not clamped.
pub const MAX_LIMIT: usize = 5000;
/// Maximum predicates per query.
pub const MAX_PREDICATES: usize = 8;
/// Maximum values in one `in` predicate.
pub const MAX_IN_VALUES: usize = 16;

const NAME_ECHO_CHARS: usize = 64;

struct EntityRules {
    entity: Entity,
    fields: &'static [&'static str],
}

static WHITELIST: &[EntityRules] = &[
    EntityRules {
        entity: Entity::Company,
        fields: &["Name", "StartOfBooks", "EndOfBooks", "Currency"],
    },
    EntityRules {
        entity: Entity::Ledger,
        fields: &[
            "Name",
            "Parent",
            "OpeningBalance",
            "ClosingBalance",
            "IsRevenue",
            "IsExpense",
            "IsAsset",
            "IsLiability",
            "IsDebitBalance",
        ],
    },
    EntityRules {
        entity: Entity::Voucher,
        fields: &[
            "Date",
            "VoucherNumber",
            "VoucherType",
            "Amount",
            "Reference",
            "Narration",
            "PartyName",
        ],
    },
    EntityRules {
        entity: Entity::StockItem,
        fields: &["Name", "StockGroup", "ClosingStock", "ClosingValue", "Unit"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Allow,
    Deny(DenyReason),
}

impl ValidationVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ValidationVerdict::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            ValidationVerdict::Allow => Ok(()),
            ValidationVerdict::Deny(reason) => Err(reason),
        }
    }
}

/// Why a query was denied. Messages name schema elements only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("entity {entity} is not permitted")]
    UnknownEntity { entity: String },

    #[error("field '{field}' is not permitted on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("operator '{operator}' is not permitted on field '{field}'")]
    DisallowedOperator {
        field: String,
        operator: String,
        permitted: Vec<String>,
    },

    #[error("predicate count {count} exceeds limit of {max}")]
    TooManyPredicates { count: usize, max: usize },

    #[error("limit exceeds ceiling ({requested} > {max})")]
    LimitExceedsCeiling { requested: usize, max: usize },
}

impl DenyReason {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DenyReason::UnknownEntity { .. } => "unknown_entity",
            DenyReason::UnknownField { .. } => "unknown_field",
            DenyReason::DisallowedOperator { .. } => "disallowed_operator",
            DenyReason::TooManyPredicates { .. } => "too_many_predicates",
            DenyReason::LimitExceedsCeiling { .. } => "limit_exceeds_ceiling",
        }
    }
}

impl From<DenyReason> for GateError {
    fn from(reason: DenyReason) -> Self {
        let message = format!("Query denied: {}", reason);
        match reason {
            DenyReason::UnknownEntity { entity } => {
                GateError::new(ErrorCode::EntityNotPermitted, message).with_context(
                    ErrorContext::UnknownEntity {
                        entity,
                        available_entities: Entity::names(),
                    },
                )
            }
            DenyReason::UnknownField { entity, field } => {
                let available_fields = Entity::parse(&entity)
                    .map(|e| permitted_fields(e).iter().map(|f| f.to_string()).collect())
                    .unwrap_or_default();
                GateError::new(ErrorCode::FieldNotPermitted, message).with_context(
                    ErrorContext::UnknownField {
                        field,
                        entity,
                        available_fields,
                    },
                )
            }
            DenyReason::DisallowedOperator {
                field,
                operator,
                permitted,
            } => GateError::new(ErrorCode::OperatorNotPermitted, message)
                .with_context(ErrorContext::Operator {
                    field,
                    operator,
                    permitted,
                })
                .with_hint("Pattern operators (like, contains) are never permitted; use starts_with on text fields"),
            DenyReason::TooManyPredicates { count, max } => {
                GateError::new(ErrorCode::TooManyPredicates, message)
                    .with_context(ErrorContext::Bound {
                        requested: count,
                        maximum: max,
                    })
                    .with_hint("Split the request or narrow it with a date range")
            }
            DenyReason::LimitExceedsCeiling { requested, max } => {
                GateError::new(ErrorCode::LimitExceedsCeiling, message)
                    .with_context(ErrorContext::Bound {
                        requested,
                        maximum: max,
                    })
                    .with_hint(format!("Request at most {} rows", max))
            }
        }
    }
}

/// Fields a query on `entity` may project, filter or sort on.
pub fn permitted_fields(entity: Entity) -> &'static [&'static str] {
    WHITELIST
        .iter()
        .find(|r| r.entity == entity)
        .map(|r| r.fields)
        .unwrap_or(&[])
}

/// Operators permitted on a column of the given type.
pub fn permitted_operators(data_type: DataType) -> &'static [Operator] {
    match data_type {
        DataType::String => &[
            Operator::Eq,
            Operator::NotEq,
            Operator::StartsWith,
            Operator::In,
        ],
        DataType::Decimal => &[
            Operator::Eq,
            Operator::NotEq,
            Operator::Gt,
            Operator::GtEq,
            Operator::Lt,
            Operator::LtEq,
            Operator::Between,
            Operator::In,
        ],
        DataType::Date => &[
            Operator::Eq,
            Operator::NotEq,
            Operator::Gt,
            Operator::GtEq,
            Operator::Lt,
            Operator::LtEq,
            Operator::Between,
        ],
        DataType::Boolean => &[Operator::Eq, Operator::NotEq],
    }
}

/// Check a canonical query against the whitelist.
pub fn validate(query: &CanonicalQuery) -> ValidationVerdict {
    match check(query) {
        Ok(()) => ValidationVerdict::Allow,
        Err(reason) => ValidationVerdict::Deny(reason),
    }
}

fn check(query: &CanonicalQuery) -> Result<(), DenyReason> {
    let rules = WHITELIST
        .iter()
        .find(|r| r.entity == query.entity)
        .ok_or_else(|| DenyReason::UnknownEntity {
            entity: query.entity.to_string(),
        })?;
    let table = query.entity.table();

    let field_permitted = |field: &str| -> Result<DataType, DenyReason> {
        let deny = || DenyReason::UnknownField {
            entity: query.entity.to_string(),
            field: scrub_truncated(field, NAME_ECHO_CHARS),
        };
        if !rules.fields.contains(&field) {
            return Err(deny());
        }
        table.column(field).map(|c| c.data_type).ok_or_else(deny)
    };

    for field in &query.fields {
        field_permitted(field)?;
    }

    if query.predicates.len() > MAX_PREDICATES {
        return Err(DenyReason::TooManyPredicates {
            count: query.predicates.len(),
            max: MAX_PREDICATES,
        });
    }

    for predicate in &query.predicates {
        let data_type = field_permitted(&predicate.field)?;
        let permitted = permitted_operators(data_type);
        let oversized_set =
            predicate.op.class() == OperatorClass::Set && predicate.params.len() > MAX_IN_VALUES;
        if !permitted.contains(&predicate.op) || oversized_set {
            return Err(DenyReason::DisallowedOperator {
                field: predicate.field.clone(),
                operator: predicate.op.to_string(),
                permitted: permitted.iter().map(|o| o.to_string()).collect(),
            });
        }
    }

    if let Some(range) = &query.date_range {
        field_permitted(&range.field)?;
    }
    if let Some(order) = &query.order_by {
        field_permitted(&order.field)?;
    }

    if query.limit > MAX_LIMIT {
        return Err(DenyReason::LimitExceedsCeiling {
            requested: query.limit,
            max: MAX_LIMIT,
        });
    }

    Ok(())
}
