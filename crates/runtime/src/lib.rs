//! tallygate runtime: intent resolution, result caching and query execution.
//!
//! # Architecture
//!
//! ```text
//! free text ──► Intent Resolver ──┐
//!                                 ▼
//! FilterSet ─────────────► Query Builder ──► Whitelist ──► Result Cache ──► Connection Pool ──► Source
//! ```
//!
//! The pool and the cache are built by the caller and injected into
//! [`QueryExecutor`]; nothing here is global.

pub mod aggregate;
pub mod cache;
pub mod dates;
pub mod executor;
pub mod intent;
pub mod reports;
pub mod vocabulary;

pub use cache::{CacheEntry, CacheError, CacheStats, ResultCache};
pub use executor::{ExecutionStage, Fetched, QueryExecutor};
pub use intent::{resolve, Intent, IntentClassifier, IntentScope, PatternClassifier};
pub use reports::{Report, Summary};
pub use vocabulary::VoucherType;
