//! Caller-facing statement and result-set handles

use std::fmt;
use std::sync::Arc;

use tenax_core::{DbResult, DbRows, DbStatement, Value};

use crate::registry::HandleId;

/// A prepared statement owned by a [`Session`](super::Session).
///
/// The handle stays cheap to clone; validity is decided by the session's
/// registry, not by this value. Once the owning connection is replaced the
/// handle is stale and every session operation on it fails.
#[derive(Clone)]
pub struct Statement {
    id: HandleId,
    raw: Arc<dyn DbStatement>,
}

impl Statement {
    pub(super) fn new(id: HandleId, raw: Arc<dyn DbStatement>) -> Self {
        Self { id, raw }
    }

    /// Registry identity of this handle.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Commit automatically after each successful execution.
    pub fn set_auto_commit(&self, enabled: bool) {
        self.raw.set_auto_commit(enabled);
    }

    /// Bind a value to a 1-based parameter position.
    ///
    /// Client-side buffering; intended for `on_create_statement` hooks,
    /// which must be able to re-apply their bindings on every attempt.
    pub fn bind(&self, position: u32, value: Value) -> DbResult<()> {
        self.raw.bind(position, value)
    }

    pub(super) fn raw(&self) -> &dyn DbStatement {
        self.raw.as_ref()
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement").field("id", &self.id).finish()
    }
}

/// An open cursor produced by executing a [`Statement`] as a query.
///
/// Owned by its parent statement: closing the result set also terminates
/// the statement that produced it.
#[derive(Clone)]
pub struct ResultSet {
    id: HandleId,
    raw: Arc<dyn DbRows>,
    statement: Statement,
}

impl ResultSet {
    pub(super) fn new(id: HandleId, raw: Arc<dyn DbRows>, statement: Statement) -> Self {
        Self { id, raw, statement }
    }

    /// Registry identity of this handle.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The statement this cursor was produced by.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub(super) fn raw(&self) -> &dyn DbRows {
        self.raw.as_ref()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("id", &self.id)
            .field("statement", &self.statement)
            .finish()
    }
}
