//! Query construction and validation for tallygate.
//!
//! This crate turns untrusted structured requests into safe, parameterized queries:
//! - **Schema** (`schema`): the closed set of entities and their typed columns.
//! - **Builder** (`builder`): resolves a `FilterSet` into a `CanonicalQuery`, coercing literals.
//! - **Canonical form** (`canonical`): operators, typed parameters and statement rendering.
//! - **Whitelist** (`whitelist`): the pure allow/deny check run before any execution.
//! - **Fingerprint** (`fingerprint`): deterministic cache key of a canonical query.
pub mod builder;
pub mod canonical;
pub mod fingerprint;
pub mod schema;
pub mod whitelist;

pub use builder::{BuildError, QueryBuilder};
pub use canonical::{CanonicalQuery, Operator, ParamValue, Statement};
pub use fingerprint::Fingerprint;
pub use schema::{DataType, Entity};
pub use whitelist::{validate, DenyReason, ValidationVerdict, MAX_LIMIT};
