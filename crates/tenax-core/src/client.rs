//! Interface of the underlying database protocol client
//!
//! The protocol client (TCP, authentication, wire parsing, SQL execution)
//! is not part of this layer; it is consumed exclusively through these
//! object-safe traits. Every handle a trait returns is an opaque
//! server-side resource whose validity ends when the connection that
//! produced it is replaced.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{DbResult, ExecStatus, Row, Value};

/// Entry point into the protocol client: creates client environments.
pub trait DbDriver: Send + Sync + 'static {
    /// Driver identifier used in logs (e.g. "oracle").
    fn name(&self) -> &'static str;

    /// Create a fresh client environment. Called lazily the first time a
    /// connection is needed and again after an environment is discarded.
    fn create_environment(&self) -> DbResult<Arc<dyn DbEnvironment>>;
}

/// A client environment: owns client-side state shared by the connections
/// it opens.
#[async_trait]
pub trait DbEnvironment: Send + Sync {
    /// Open an authenticated connection to the given target.
    ///
    /// The credential and target strings are opaque to the session layer;
    /// their format is owned by the concrete client.
    async fn connect(
        &self,
        user: &str,
        password: &str,
        target: &str,
    ) -> DbResult<Arc<dyn DbConnection>>;

    /// Release client-side resources owned by this environment.
    async fn close(&self) -> DbResult<()>;
}

/// An open, authenticated connection.
#[async_trait]
pub trait DbConnection: Send + Sync {
    /// Prepare a statement from SQL text.
    async fn prepare(&self, sql: &str) -> DbResult<Arc<dyn DbStatement>>;

    /// Bound the number of prepared statements the client keeps cached for
    /// this connection.
    fn set_statement_cache_size(&self, slots: u32);

    /// Commit the current transaction.
    async fn commit(&self) -> DbResult<()>;

    /// Roll back the current transaction.
    async fn rollback(&self) -> DbResult<()>;

    /// Close the connection.
    async fn close(&self) -> DbResult<()>;
}

/// A prepared statement.
#[async_trait]
pub trait DbStatement: Send + Sync {
    /// Commit automatically after each successful execution.
    fn set_auto_commit(&self, enabled: bool);

    /// Bind a value to a 1-based parameter position. Client-side; takes
    /// effect at the next execution.
    fn bind(&self, position: u32, value: Value) -> DbResult<()>;

    /// Execute the statement, whatever its shape.
    async fn execute(&self) -> DbResult<ExecStatus>;

    /// Execute as a query, producing an open cursor.
    async fn execute_query(&self) -> DbResult<Arc<dyn DbRows>>;

    /// Execute as DML, producing an affected-row count.
    async fn execute_update(&self) -> DbResult<u64>;

    /// Release the server-side statement resource.
    async fn close(&self) -> DbResult<()>;
}

/// An open server-side cursor.
#[async_trait]
pub trait DbRows: Send + Sync {
    /// Advance to the next row. Returns false once the cursor is exhausted.
    async fn next(&self) -> DbResult<bool>;

    /// The row the cursor is currently positioned on.
    fn current(&self) -> DbResult<Row>;

    /// Release the server-side cursor resource.
    async fn close(&self) -> DbResult<()>;
}
