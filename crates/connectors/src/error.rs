use tallygate_error::{ErrorCode, ErrorContext, GateError};
use thiserror::Error;

/// Failure to open a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The source could not be reached or is temporarily unavailable.
    #[error("source unreachable: {0}")]
    Unreachable(String),

    /// The source answered and refused the session (credentials, licensing).
    #[error("source rejected the session: {0}")]
    Rejected(String),
}

impl ConnectError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectError::Unreachable(_))
    }
}

/// Failure while a session was running a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("connectivity lost: {0}")]
    ConnectivityLost(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("query timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
}

impl ExecutionError {
    /// Transient failures are retried on a fresh session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExecutionError::ConnectivityLost(_) | ExecutionError::Timeout { .. }
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ExecutionError::ConnectivityLost(_) => ErrorCode::ConnectivityLost,
            ExecutionError::ProtocolError(_) => ErrorCode::ProtocolError,
            ExecutionError::Timeout { .. } => ErrorCode::ExecutionTimeout,
        }
    }

    pub fn into_gate_error(self, source_name: &str, attempts: u32) -> GateError {
        let code = self.code();
        let error = GateError::new(code, self.to_string()).with_context(ErrorContext::Connection {
            source_name: source_name.to_string(),
            attempts,
        });
        match self {
            ExecutionError::Timeout { .. } => {
                error.with_hint("Narrow the date range or lower the limit, then retry")
            }
            ExecutionError::ConnectivityLost(_) => {
                error.with_hint("Check that the accounting engine and its ODBC server are running")
            }
            ExecutionError::ProtocolError(_) => error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("no session available within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    #[error("failed to open a session after {attempts} attempt(s): {source}")]
    ConnectFailed {
        attempts: u32,
        #[source]
        source: ConnectError,
    },
}

impl PoolError {
    pub fn is_transient(&self) -> bool {
        match self {
            PoolError::Timeout { .. } => true,
            PoolError::ConnectFailed { source, .. } => source.is_transient(),
        }
    }

    pub fn into_gate_error(self, source_name: &str) -> GateError {
        let message = self.to_string();
        match self {
            PoolError::Timeout { .. } => GateError::new(ErrorCode::PoolTimeout, message)
                .with_context(ErrorContext::Connection {
                    source_name: source_name.to_string(),
                    attempts: 1,
                })
                .with_hint("All sessions are busy; retry shortly or raise pool.max_size"),
            PoolError::ConnectFailed { attempts, .. } => {
                GateError::new(ErrorCode::ConnectFailed, message)
                    .with_context(ErrorContext::Connection {
                        source_name: source_name.to_string(),
                        attempts,
                    })
                    .with_hint("Check that the accounting engine and its ODBC server are running")
            }
        }
    }
}
