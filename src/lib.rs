//! httpcall library crate.
//!
//! Placeholder substitution, response extraction/redaction and request
//! execution; the `httpcall` binary and integration tests in `tests/`
//! build on it.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod models;
pub mod placeholder;
pub mod query;
pub mod transport;
pub mod vault;
