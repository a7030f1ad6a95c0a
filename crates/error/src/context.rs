//! # Error Contexts
//!
//! Structured metadata attached to errors so callers can react without parsing messages.

use serde::{Deserialize, Serialize};

/// Structured context for a [`crate::GateError`].
///
/// None of the variants carry raw request text verbatim; denial contexts only
/// name the offending schema element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for TG-2001 / TG-3001
    UnknownEntity {
        entity: String,
        available_entities: Vec<String>,
    },

    /// Context for TG-2002 / TG-3002
    UnknownField {
        field: String,
        entity: String,
        available_fields: Vec<String>,
    },

    /// Context for TG-2003
    TypeMismatch {
        field: String,
        expected: String,
    },

    /// Context for TG-3003
    Operator {
        field: String,
        operator: String,
        permitted: Vec<String>,
    },

    /// Context for TG-2007 / TG-3004 / TG-3005
    Bound {
        requested: usize,
        maximum: usize,
    },

    /// Context for connection errors (TG-1001..1004)
    Connection {
        source_name: String,
        attempts: u32,
    },

    /// Context for TG-4001. The text is scrubbed and truncated before it lands here.
    Intent { text: String },

    /// Context for TG-5001..5003
    Config {
        file_path: Option<String>,
        field: Option<String>,
    },
}
