//! Retry-until-success execution
//!
//! The `ensure_*` calls block until the statement eventually executes,
//! sleeping the session's fixed retry delay between attempts. Their only
//! terminal state is success: every failure, including a lost connection,
//! a stale handle raced by a concurrent reconnect, or an error escaping a
//! caller hook, is absorbed, logged or routed to the matching hook, and
//! retried. An attempt that fails for lack of a usable connection (never
//! connected, or the bounded rebuild after a transient error did not
//! succeed) re-enters the unbounded connect loop before the next attempt.
//! A fresh statement is created on every attempt, so hooks that bind
//! parameters are re-applied each time.

use anyhow::Result as CallbackResult;
use tenax_core::{DbError, DbResult, ExecStatus, Result, Row, TenaxError};

use super::handles::Statement;
use super::session::Session;

type OnCreateStatement<'a> = Box<dyn FnMut(&Statement) -> DbResult<()> + Send + 'a>;
type OnDbError<'a> = Box<dyn FnMut(&DbError) -> CallbackResult<()> + Send + 'a>;

/// Optional hooks for [`Session::ensure_execute_with`].
#[derive(Default)]
pub struct EnsureCallbacks<'a> {
    pub(super) on_create_statement: Option<OnCreateStatement<'a>>,
    pub(super) on_error: Option<OnDbError<'a>>,
    pub(super) on_batch_error: Option<OnDbError<'a>>,
}

impl<'a> EnsureCallbacks<'a> {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run after each statement creation, before execution. Typically
    /// binds parameters; must be re-appliable, since every attempt starts
    /// from a fresh statement.
    pub fn on_create_statement(
        mut self,
        hook: impl FnMut(&Statement) -> DbResult<()> + Send + 'a,
    ) -> Self {
        self.on_create_statement = Some(Box::new(hook));
        self
    }

    /// Run for each failed attempt that ended in a non-batch database
    /// error. A failing hook is logged and contained.
    pub fn on_error(mut self, hook: impl FnMut(&DbError) -> CallbackResult<()> + Send + 'a) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Run for each failed attempt that ended in a batch partial failure.
    pub fn on_batch_error(
        mut self,
        hook: impl FnMut(&DbError) -> CallbackResult<()> + Send + 'a,
    ) -> Self {
        self.on_batch_error = Some(Box::new(hook));
        self
    }
}

impl Session {
    /// Execute SQL text, retrying until it succeeds. Returns the final
    /// execution status.
    pub async fn ensure_execute(&self, sql: &str) -> ExecStatus {
        self.ensure_execute_with(sql, EnsureCallbacks::new()).await
    }

    /// [`ensure_execute`](Self::ensure_execute) with hooks.
    ///
    /// Each attempt creates a fresh auto-committing statement, runs the
    /// `on_create_statement` hook, executes, and terminates the statement.
    /// Batch partial failures are routed to `on_batch_error`, other
    /// database errors to `on_error`; then the session sleeps the retry
    /// delay and starts over.
    pub async fn ensure_execute_with(
        &self,
        sql: &str,
        mut callbacks: EnsureCallbacks<'_>,
    ) -> ExecStatus {
        tracing::debug!(sql, "ensuring statement execution");
        loop {
            match self.ensure_attempt(sql, &mut callbacks).await {
                Ok(status) => return status,
                Err(err) => {
                    if let Some(db) = self.retryable_db_error(&err) {
                        if db.is_batch() {
                            if let Some(hook) = callbacks.on_batch_error.as_deref_mut() {
                                self.run_error_hook(hook, db);
                            }
                        } else if let Some(hook) = callbacks.on_error.as_deref_mut() {
                            self.run_error_hook(hook, db);
                        }
                    }
                    self.reconnect_for_retry(&err).await;
                }
            }
            self.retry_sleep().await;
        }
    }

    /// Execute SQL text as DML, retrying until it succeeds. Returns the
    /// affected-row count.
    pub async fn ensure_execute_update(&self, sql: &str) -> u64 {
        self.ensure_execute_update_with(sql, |_| Ok(())).await
    }

    /// [`ensure_execute_update`](Self::ensure_execute_update) with an
    /// error hook, invoked once per failed attempt. A failure raised by
    /// the hook itself is caught and logged, never escapes the loop.
    pub async fn ensure_execute_update_with<E>(&self, sql: &str, mut on_error: E) -> u64
    where
        E: FnMut(&DbError) -> CallbackResult<()> + Send,
    {
        tracing::debug!(sql, "ensuring update execution");
        loop {
            match self.update_attempt(sql).await {
                Ok(count) => return count,
                Err(err) => {
                    if let Some(db) = self.retryable_db_error(&err) {
                        self.run_error_hook(&mut on_error, db);
                    }
                    self.reconnect_for_retry(&err).await;
                }
            }
            self.retry_sleep().await;
        }
    }

    /// Execute a query, retrying until the whole stream has been delivered
    /// to `on_row` (or the callback stopped early).
    pub async fn ensure_execute_query<F>(&self, sql: &str, on_row: F)
    where
        F: FnMut(&Row) -> CallbackResult<bool> + Send,
    {
        self.ensure_execute_query_with(sql, on_row, |_| Ok(())).await
    }

    /// [`ensure_execute_query`](Self::ensure_execute_query) with an error
    /// hook.
    ///
    /// Resumption is client-side: the session counts the rows `on_row`
    /// has accepted and, after a failed attempt, re-executes the query
    /// from the beginning and silently skips that many rows before
    /// delivery resumes. There is no server-side cursor resumption.
    ///
    /// Caveat: skipping is only correct when re-execution yields the same
    /// rows in the same order. If concurrent writes reorder or change the
    /// result between attempts, rows can be skipped incorrectly or
    /// delivered twice.
    pub async fn ensure_execute_query_with<F, E>(&self, sql: &str, mut on_row: F, mut on_error: E)
    where
        F: FnMut(&Row) -> CallbackResult<bool> + Send,
        E: FnMut(&DbError) -> CallbackResult<()> + Send,
    {
        tracing::debug!(sql, "ensuring query execution");
        let mut delivered: u64 = 0;
        loop {
            match self.query_attempt(sql, &mut on_row, &mut delivered).await {
                Ok(()) => return,
                Err(err) => {
                    if let Some(db) = self.retryable_db_error(&err) {
                        self.run_error_hook(&mut on_error, db);
                    }
                    self.reconnect_for_retry(&err).await;
                }
            }
            self.retry_sleep().await;
        }
    }

    async fn ensure_attempt(
        &self,
        sql: &str,
        callbacks: &mut EnsureCallbacks<'_>,
    ) -> Result<ExecStatus> {
        let stmt = self.create_statement(sql).await?;
        let result = self.ensure_attempt_on(&stmt, callbacks).await;
        self.terminate_statement(&stmt).await;
        result
    }

    async fn ensure_attempt_on(
        &self,
        stmt: &Statement,
        callbacks: &mut EnsureCallbacks<'_>,
    ) -> Result<ExecStatus> {
        stmt.set_auto_commit(true);
        if let Some(prepare) = callbacks.on_create_statement.as_deref_mut() {
            prepare(stmt)?;
        }
        self.execute_statement(stmt).await
    }

    async fn update_attempt(&self, sql: &str) -> Result<u64> {
        let stmt = self.create_statement(sql).await?;
        stmt.set_auto_commit(true);
        let result = self.update_statement(&stmt).await;
        self.terminate_statement(&stmt).await;
        result
    }

    async fn query_attempt<F>(&self, sql: &str, on_row: &mut F, delivered: &mut u64) -> Result<()>
    where
        F: FnMut(&Row) -> CallbackResult<bool> + Send,
    {
        let stmt = self.create_statement(sql).await?;
        let rs = match self.query_statement(&stmt).await {
            Ok(rs) => rs,
            Err(err) => {
                self.terminate_statement(&stmt).await;
                return Err(err);
            }
        };

        let skip = *delivered;
        if skip > 0 {
            tracing::debug!(skip, "skipping rows delivered in a previous attempt");
        }
        let outcome = self.stream_rows(&rs, on_row, skip, delivered).await;
        self.close_result_set(&rs).await;
        outcome
    }

    /// An attempt that failed because the session has no usable connection
    /// must not spin against a dead session: block here, reconnecting with
    /// the configured delay, until the database accepts us again. An
    /// already-restored connection makes this a no-op.
    async fn reconnect_for_retry(&self, err: &TenaxError) {
        if matches!(err, TenaxError::NotConnected | TenaxError::Connect(_)) {
            if let Err(connect_err) = self.connect(true).await {
                tracing::warn!(error = %connect_err, "failed to re-establish connection");
            }
        }
    }

    async fn retry_sleep(&self) {
        let delay = self.config().retry.delay();
        tracing::debug!(?delay, "sleeping before next attempt");
        tokio::time::sleep(delay).await;
    }

    /// Extract the database error a failed attempt should be retried for.
    /// Non-database failures are logged here and retried without a hook.
    fn retryable_db_error<'e>(&self, err: &'e TenaxError) -> Option<&'e DbError> {
        match err {
            TenaxError::Db(db) => Some(db),
            TenaxError::Callback(inner) => match inner.downcast_ref::<DbError>() {
                Some(db) => Some(db),
                None => {
                    let message = inner.to_string();
                    if !message.is_empty() {
                        tracing::error!(error = %message, "row callback failed, retrying");
                    }
                    None
                }
            },
            other => {
                tracing::warn!(error = %other, "retrying after non-database failure");
                None
            }
        }
    }

    fn run_error_hook(
        &self,
        hook: &mut (dyn FnMut(&DbError) -> CallbackResult<()> + Send),
        err: &DbError,
    ) {
        if let Err(hook_err) = hook(err) {
            tracing::error!(error = %hook_err, "error hook failed");
        }
    }
}
