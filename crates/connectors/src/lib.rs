//! Data source access for tallygate.
//!
//! - **Sources** (`sources`): the `Connector`/`SourceSession` seam plus fixture and gateway implementations.
//! - **Pool** (`pool`): bounded, reusable sessions with reconnect backoff.
//! - **Errors** (`error`): connect, execution and pool failures, classified transient or permanent.
pub mod error;
pub mod pool;
pub mod sources;

pub use error::{ConnectError, ExecutionError, PoolError};
pub use pool::{ConnectionPool, PoolStats, PooledSession};
pub use sources::{default_registry, Connector, SourceRegistry, SourceSession};
