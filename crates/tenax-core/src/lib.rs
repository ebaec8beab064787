//! Tenax Core - Core abstractions for the session resilience layer
//!
//! This crate provides the fundamental traits and types that the tenax
//! crates depend on. It defines:
//!
//! - `DbDriver` / `DbEnvironment` / `DbConnection` / `DbStatement` /
//!   `DbRows` - The interface of the underlying database protocol client
//! - `DbError` and its transient/fatal classification
//! - `TenaxError` - The error type for session-layer operations
//! - Common types like `Value`, `Row` and `ExecStatus`

mod client;
mod error;
mod types;

pub use client::*;
pub use error::*;
pub use types::*;
