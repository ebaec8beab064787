//! Single-attempt execution wrappers
//!
//! Each primitive performs exactly one execution attempt. A transient
//! error triggers one bounded connection rebuild as a side effect, and the
//! original error is then re-raised: this layer never converts a failure
//! into a success, it only makes sure the session is usable again before
//! the caller decides what to do next.

use anyhow::Result as CallbackResult;
use tenax_core::{ExecStatus, Result, Row, TenaxError};

use super::handles::{ResultSet, Statement};
use super::session::Session;

impl Session {
    /// Execute a prepared statement once.
    pub async fn execute_statement(&self, stmt: &Statement) -> Result<ExecStatus> {
        let mut state = self.state.lock().await;
        if !self.registry.contains_statement(stmt.id()) {
            return Err(TenaxError::StaleHandle(stmt.id().to_string()));
        }

        match stmt.raw().execute().await {
            Ok(status) => Ok(status),
            Err(err) => {
                self.handle_db_error(&mut state, &err, Some(stmt)).await?;
                Err(err.into())
            }
        }
    }

    /// Execute a prepared statement once as a query, registering the
    /// produced cursor.
    pub async fn query_statement(&self, stmt: &Statement) -> Result<ResultSet> {
        let mut state = self.state.lock().await;
        if !self.registry.contains_statement(stmt.id()) {
            return Err(TenaxError::StaleHandle(stmt.id().to_string()));
        }

        match stmt.raw().execute_query().await {
            Ok(rows) => {
                let id = self.registry.register_result_set();
                tracing::trace!(%id, statement = %stmt.id(), "result set opened");
                Ok(ResultSet::new(id, rows, stmt.clone()))
            }
            Err(err) => {
                self.handle_db_error(&mut state, &err, Some(stmt)).await?;
                Err(err.into())
            }
        }
    }

    /// Execute a prepared statement once as DML, returning the
    /// affected-row count.
    pub async fn update_statement(&self, stmt: &Statement) -> Result<u64> {
        let mut state = self.state.lock().await;
        if !self.registry.contains_statement(stmt.id()) {
            return Err(TenaxError::StaleHandle(stmt.id().to_string()));
        }

        match stmt.raw().execute_update().await {
            Ok(count) => Ok(count),
            Err(err) => {
                self.handle_db_error(&mut state, &err, Some(stmt)).await?;
                Err(err.into())
            }
        }
    }

    /// Execute SQL text once. The statement is created for this call and
    /// terminated on both the success and the failure path.
    pub async fn execute(&self, sql: &str) -> Result<ExecStatus> {
        tracing::debug!(sql, "executing statement");
        let stmt = self.create_statement(sql).await?;
        let result = self.execute_statement(&stmt).await;
        self.terminate_statement(&stmt).await;
        result
    }

    /// Execute SQL text once as a query and drain the cursor through
    /// `on_row`.
    ///
    /// The callback returns `Ok(true)` to receive the next row and
    /// `Ok(false)` to stop early; iteration is driven entirely by that
    /// return value. The result set and its statement are released before
    /// this call returns, on every path.
    pub async fn execute_query<F>(&self, sql: &str, mut on_row: F) -> Result<()>
    where
        F: FnMut(&Row) -> CallbackResult<bool> + Send,
    {
        tracing::debug!(sql, "executing query");
        let stmt = self.create_statement(sql).await?;
        let rs = match self.query_statement(&stmt).await {
            Ok(rs) => rs,
            Err(err) => {
                self.terminate_statement(&stmt).await;
                return Err(err);
            }
        };

        let outcome = self.stream_rows(&rs, &mut on_row, 0, &mut 0).await;
        self.close_result_set(&rs).await;
        outcome
    }

    /// Execute SQL text once as DML. The statement is created for this
    /// call and terminated on both the success and the failure path.
    pub async fn execute_update(&self, sql: &str) -> Result<u64> {
        tracing::debug!(sql, "executing update");
        let stmt = self.create_statement(sql).await?;
        let result = self.update_statement(&stmt).await;
        self.terminate_statement(&stmt).await;
        result
    }

    /// Drive an open cursor: advance past `skip` rows without delivering
    /// them, then hand each remaining row to `on_row` until it returns
    /// false or the cursor is exhausted. `delivered` counts rows the
    /// callback accepted, across the whole stream.
    pub(super) async fn stream_rows<F>(
        &self,
        rs: &ResultSet,
        on_row: &mut F,
        skip: u64,
        delivered: &mut u64,
    ) -> Result<()>
    where
        F: FnMut(&Row) -> CallbackResult<bool> + Send,
    {
        for _ in 0..skip {
            if !self.next(rs).await? {
                // Fewer rows than previously delivered; nothing to resume.
                return Ok(());
            }
        }

        while self.next(rs).await? {
            let row = self.current_row(rs)?;
            match on_row(&row) {
                Ok(true) => *delivered += 1,
                Ok(false) => break,
                Err(err) => return Err(TenaxError::Callback(err)),
            }
        }
        Ok(())
    }
}
