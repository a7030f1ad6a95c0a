use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following TG-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Connection errors (transient, retryable)
/// - **2000-2999**: Query build errors
/// - **3000-3999**: Security / whitelist denials
/// - **4000-4999**: Intent resolution errors
/// - **5000-5999**: Configuration errors
/// - **9000-9999**: Internal errors
///
/// Codes are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Connection Errors (1000-1999) ===
    /// TG-1001: No pooled session became available in time
    PoolTimeout = 1001,
    /// TG-1002: Opening a session failed after all retries
    ConnectFailed = 1002,
    /// TG-1003: Connection dropped while a query was running
    ConnectivityLost = 1003,
    /// TG-1004: Query exceeded the execution timeout
    ExecutionTimeout = 1004,

    // === Query Build Errors (2000-2999) ===
    /// TG-2001: Entity is not part of the schema
    UnknownEntity = 2001,
    /// TG-2002: Field is not part of the entity's schema
    UnknownField = 2002,
    /// TG-2003: Literal does not match the field's declared type
    TypeMismatch = 2003,
    /// TG-2004: Operator is not part of the request language
    UnsupportedOperator = 2004,
    /// TG-2005: Date range is inverted or targets an entity without dates
    InvalidDateRange = 2005,
    /// TG-2006: The data source answered with something it should not have
    ProtocolError = 2006,
    /// TG-2007: An aggregate's input hit the row ceiling, so totals would be partial
    AggregateInputTruncated = 2007,

    // === Security Errors (3000-3999) ===
    /// TG-3001: Entity is not whitelisted
    EntityNotPermitted = 3001,
    /// TG-3002: Field is not whitelisted for the entity
    FieldNotPermitted = 3002,
    /// TG-3003: Operator is not whitelisted for the field
    OperatorNotPermitted = 3003,
    /// TG-3004: Too many predicates in one query
    TooManyPredicates = 3004,
    /// TG-3005: Requested limit is above the hard ceiling
    LimitExceedsCeiling = 3005,

    // === Intent Errors (4000-4999) ===
    /// TG-4001: Free text did not match any known intent
    UnrecognizedIntent = 4001,

    // === Configuration Errors (5000-5999) ===
    /// TG-5001: Configuration file or environment could not be parsed
    InvalidConfig = 5001,
    /// TG-5002: Configured source type is not supported
    UnsupportedSourceType = 5002,
    /// TG-5003: Fixture data could not be loaded
    InvalidFixture = 5003,

    // === Internal Errors (9000-9999) ===
    /// TG-9001: Unexpected internal state
    Internal = 9001,
    /// TG-9002: Serialization/deserialization failed
    SerializationFailed = 9002,
    /// TG-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "TG-2002")
    pub fn as_str(&self) -> String {
        format!("TG-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Connection,
            2000..=2999 => ErrorCategory::Query,
            3000..=3999 => ErrorCategory::Security,
            4000..=4999 => ErrorCategory::Intent,
            5000..=5999 => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }

    /// Only connection-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Connection
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("TG-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::PoolTimeout),
            1002 => Ok(Self::ConnectFailed),
            1003 => Ok(Self::ConnectivityLost),
            1004 => Ok(Self::ExecutionTimeout),
            2001 => Ok(Self::UnknownEntity),
            2002 => Ok(Self::UnknownField),
            2003 => Ok(Self::TypeMismatch),
            2004 => Ok(Self::UnsupportedOperator),
            2005 => Ok(Self::InvalidDateRange),
            2006 => Ok(Self::ProtocolError),
            2007 => Ok(Self::AggregateInputTruncated),
            3001 => Ok(Self::EntityNotPermitted),
            3002 => Ok(Self::FieldNotPermitted),
            3003 => Ok(Self::OperatorNotPermitted),
            3004 => Ok(Self::TooManyPredicates),
            3005 => Ok(Self::LimitExceedsCeiling),
            4001 => Ok(Self::UnrecognizedIntent),
            5001 => Ok(Self::InvalidConfig),
            5002 => Ok(Self::UnsupportedSourceType),
            5003 => Ok(Self::InvalidFixture),
            9001 => Ok(Self::Internal),
            9002 => Ok(Self::SerializationFailed),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category, used for exit codes and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCategory {
    Connection,
    Query,
    Security,
    Intent,
    Config,
    Internal,
}
