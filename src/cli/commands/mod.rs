//! CLI command implementations.

pub mod all;
pub mod analyze;
pub mod ingest;
pub mod manager;
pub mod strategies;
pub mod trade;
pub mod validate;
