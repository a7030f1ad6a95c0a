//! # tallygate-error
//!
//! Unified error type for the tallygate query mediation layer.
//!
//! Every failure that reaches a caller is a [`GateError`]. Besides the stable
//! TG-XXXX code it records where in the pipeline the request stopped and, once
//! a query got that far, the short fingerprint of the canonical query that
//! failed. That fingerprint is the same key the cache and the query log use.
//!
//! Domain crates keep their own `thiserror` enums and convert into `GateError`
//! at the boundary.

mod code;
mod context;
mod convert;

pub use code::{ErrorCategory, ErrorCode};
pub use context::ErrorContext;
pub use convert::find_closest_match;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateError {
    pub code: ErrorCode,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// How the caller can correct the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Pipeline stage that failed (`building`, `validating`, `executing`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Short fingerprint of the canonical query, absent when building failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
}

impl GateError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
            stage: None,
            query_id: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Record the stage the request was in. The first stage recorded wins.
    pub fn at_stage(mut self, stage: impl fmt::Display) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage.to_string());
        }
        self
    }

    pub fn for_query(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }

    /// Transient failures (pool exhaustion, lost connectivity, timeouts) may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize GateError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)?;
        if let Some(stage) = &self.stage {
            write!(f, " while {}", stage)?;
        }
        if let Some(id) = &self.query_id {
            write!(f, " [query {}]", id)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "; hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for GateError {}
