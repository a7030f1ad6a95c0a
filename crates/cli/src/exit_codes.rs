//! Structured exit codes for machine-readable error handling.
//!
//! Scripts can tell a bad request apart from an unreachable engine without parsing output.

/// Success (standard convention)
pub const SUCCESS: i32 = 0;

/// General error (fallback for unknown errors)
pub const GENERAL_ERROR: i32 = 1;

/// CLI usage error (invalid arguments, unknown report, unreadable filter file)
pub const USAGE_ERROR: i32 = 2;

/// Configuration error (YAML parse failure, failed validation, bad fixture)
pub const CONFIG_ERROR: i32 = 3;

/// Connection error (pool timeout, engine unreachable, lost connectivity)
pub const CONNECTION_ERROR: i32 = 4;

/// Validation error (unknown field, type mismatch, whitelist denial)
pub const VALIDATION_ERROR: i32 = 5;

/// The question could not be mapped to a known intent
pub const INTENT_ERROR: i32 = 6;

use tallygate_error::{ErrorCategory, ErrorCode};

/// Exit code for a request that failed with `code`.
pub fn for_error_code(code: ErrorCode) -> i32 {
    match code.category() {
        ErrorCategory::Connection => CONNECTION_ERROR,
        ErrorCategory::Config => CONFIG_ERROR,
        ErrorCategory::Query | ErrorCategory::Security => VALIDATION_ERROR,
        ErrorCategory::Intent => INTENT_ERROR,
        ErrorCategory::Internal => GENERAL_ERROR,
        _ => GENERAL_ERROR,
    }
}
