//! nsmeta: Directory Namespace Index
//!
//! Per-tenant directory trees kept as one sorted, serialized index, with file
//! metadata records anchored to directory identifiers. The coordinator keeps the
//! two consistent across removes and moves.

pub mod concurrency;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod listing;
pub mod logging;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
