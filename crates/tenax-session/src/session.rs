//! The resilient session: connection lifecycle, execution wrappers and
//! the ensure engine
//!
//! A [`Session`] owns a single logical connection and every server-side
//! handle issued under it. Operations come in two flavors:
//!
//! - single-attempt (`execute`, `execute_query`, `execute_update` and the
//!   statement-level primitives): on connection loss they rebuild the
//!   connection once, then re-raise the original error so the caller
//!   decides what happens next;
//! - ensure-style (`ensure_execute`, `ensure_execute_update`,
//!   `ensure_execute_query`): they block, retrying with the session's
//!   fixed delay, until the statement eventually succeeds.
//!
//! # Example
//!
//! ```ignore
//! use tenax_session::{Credentials, Session, SessionConfig};
//!
//! let config = SessionConfig::new(Credentials::new("app", "secret", "db:1521/svc"));
//! let session = Session::new(driver, config);
//! session.connect(true).await?;
//!
//! session.ensure_execute("INSERT INTO audit VALUES (:1)").await;
//! session.execute_query("SELECT id FROM jobs", |row| {
//!     Ok(row.get(0).is_some())
//! }).await?;
//! ```

mod ensure;
mod execute;
mod handles;
mod session;


pub use ensure::EnsureCallbacks;
pub use handles::{ResultSet, Statement};
pub use session::Session;
