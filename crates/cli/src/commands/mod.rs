//! CLI command implementations. Each returns the process exit code.

mod ask;
mod connection;
mod filter;
mod helpers;
mod report;
mod summary;
mod validate;

pub use ask::{ask, AskOptions};
pub use connection::test_connection;
pub use filter::filter;
pub use report::{report, ReportOptions};
pub use summary::{summary, SummaryOptions};
pub use validate::validate_config;
