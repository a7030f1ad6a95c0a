//! Common utilities, types, and configuration shared across tallygate crates.
//!
//! This crate contains the base building blocks:
//! - **Configuration**: Strongly typed application configuration (`config`).
//! - **Models**: The request and response shapes crossing the core boundary (`models`).
//! - **Resilience**: Exponential backoff helpers (`retry`).
//! - **Logging**: Subscriber setup (`telemetry`) and PII scrubbing for log lines (`scrubber`).
pub mod config;
pub mod models;
pub mod retry;
pub mod scrubber;
pub mod telemetry;
