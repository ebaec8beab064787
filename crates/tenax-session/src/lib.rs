//! Tenax Session - Resilient single-session SQL execution
//!
//! This crate keeps issuing SQL statements correctly across a flaky
//! network or database session so callers do not have to write retry and
//! reconnect logic themselves. A [`Session`] owns one logical connection,
//! classifies failures as transient or fatal, rebuilds the connection
//! transparently, and invalidates every statement and result-set handle
//! issued under the previous connection generation.
//!
//! Two execution flavors are offered: single-attempt calls that reconnect
//! on connection loss and re-raise the original error, and `ensure_*`
//! calls that block, retrying with a fixed delay, until the statement
//! eventually succeeds.

mod config;
mod registry;
pub mod session;

pub use config::{Credentials, RetryPolicy, SessionConfig, DEFAULT_RETRY_DELAY};
pub use registry::{HandleId, HandleRegistry};
pub use session::{EnsureCallbacks, ResultSet, Session, Statement};
