//! Session state and connection lifecycle

use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use tenax_core::{
    exception_string, DbConnection, DbDriver, DbEnvironment, DbError, Result, Row, TenaxError,
};

use super::handles::{ResultSet, Statement};
use crate::config::{Credentials, SessionConfig};
use crate::registry::HandleRegistry;

/// Mutable connection state, guarded by the session lock.
///
/// At most one logical connection exists at any time: either both fields
/// are populated and the connection is fully usable, or `conn` is absent
/// and the session is disconnected.
pub(super) struct SessionState {
    pub(super) env: Option<Arc<dyn DbEnvironment>>,
    pub(super) conn: Option<Arc<dyn DbConnection>>,
}

/// A managed database session: one logical connection plus the registry
/// of server-side handles issued under it.
///
/// All state-mutating operations are serialized by a single async lock;
/// concurrent callers are safe but execute one at a time. The lock is
/// never held across a caller-supplied callback or a retry sleep.
pub struct Session {
    id: Uuid,
    driver: Arc<dyn DbDriver>,
    config: SessionConfig,
    pub(super) state: Mutex<SessionState>,
    pub(super) registry: HandleRegistry,
}

impl Session {
    /// Create a disconnected session. No connection is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(driver: Arc<dyn DbDriver>, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver,
            config,
            state: Mutex::new(SessionState {
                env: None,
                conn: None,
            }),
            registry: HandleRegistry::new(),
        }
    }

    /// Create a disconnected session with default configuration.
    pub fn with_credentials(
        driver: Arc<dyn DbDriver>,
        user: impl Into<String>,
        password: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(
            driver,
            SessionConfig::new(Credentials::new(user, password, target)),
        )
    }

    /// Session identity used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The live connection generation. Advances on every reconnect.
    pub fn generation(&self) -> u64 {
        self.registry.generation()
    }

    /// Whether the session currently holds an open connection.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.conn.is_some()
    }

    /// Open the connection if it is not open yet.
    ///
    /// With `retry` the call loops with the configured delay until a
    /// connection is established; without it a single failed attempt is
    /// surfaced as [`TenaxError::Connect`].
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn connect(&self, retry: bool) -> Result<()> {
        self.establish_loop(retry, false).await
    }

    /// Discard the current connection and environment, invalidate every
    /// issued handle, and build a fresh connection.
    ///
    /// The old connection handle is presumed already unusable and is
    /// dropped without a clean close.
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub(crate) async fn reconnect(&self, retry: bool) -> Result<()> {
        self.establish_loop(retry, true).await
    }

    /// Shared connect/reconnect loop. Each iteration holds the session
    /// lock for one check-and-establish step and releases it across the
    /// retry sleep. With `discard_current` the existing connection is torn
    /// down under that same guard first; otherwise an already-open
    /// connection makes this a no-op, including one opened by a concurrent
    /// caller while this one slept.
    async fn establish_loop(&self, retry: bool, mut discard_current: bool) -> Result<()> {
        loop {
            let err = {
                let mut state = self.state.lock().await;
                if discard_current {
                    self.discard_locked(&mut state).await;
                    discard_current = false;
                } else if state.conn.is_some() {
                    return Ok(());
                }
                match self.establish_locked(&mut state).await {
                    Ok(()) => return Ok(()),
                    Err(err) => err,
                }
            };

            tracing::error!(code = err.code(), error = %exception_string(&err), "failed to connect to database");
            if !retry {
                return Err(TenaxError::Connect(exception_string(&err)));
            }
            tokio::time::sleep(self.config.retry.delay()).await;
        }
    }

    /// Drop the connection, shut the environment down and invalidate all
    /// handles. Teardown failures are logged, never returned.
    async fn discard_locked(&self, state: &mut SessionState) {
        state.conn = None;
        if let Some(env) = state.env.take() {
            if let Err(err) = env.close().await {
                tracing::warn!(error = %exception_string(&err), "failed to shut down client environment");
            }
        }
        let generation = self.registry.invalidate_all();
        tracing::debug!(generation, "invalidated all statement and result-set handles");
    }

    /// One connection attempt against the current (or a freshly created)
    /// environment.
    async fn establish_locked(
        &self,
        state: &mut SessionState,
    ) -> std::result::Result<(), DbError> {
        let env = match &state.env {
            Some(env) => env.clone(),
            None => {
                let env = self.driver.create_environment()?;
                state.env = Some(env.clone());
                env
            }
        };

        let creds = &self.config.credentials;
        let conn = env.connect(&creds.user, &creds.password, &creds.target).await?;
        conn.set_statement_cache_size(self.config.statement_cache_size);
        state.conn = Some(conn);

        tracing::info!(
            driver = self.driver.name(),
            user = %creds.user,
            generation = self.registry.generation(),
            "database connection established"
        );
        Ok(())
    }

    /// Single immediate rebuild, used after a transient error. Does not
    /// loop: if the fresh connection cannot be established right away the
    /// failure is surfaced.
    async fn rebuild_once_locked(&self, state: &mut SessionState) -> Result<()> {
        self.discard_locked(state).await;
        self.establish_locked(state)
            .await
            .map_err(|err| TenaxError::Connect(exception_string(&err)))
    }

    /// Classification side effect shared by the execution wrapper and
    /// commit/rollback: a transient error triggers one bounded rebuild,
    /// provided the implicated statement (if any) still belongs to the
    /// live connection.
    pub(super) async fn handle_db_error(
        &self,
        state: &mut SessionState,
        err: &DbError,
        stmt: Option<&Statement>,
    ) -> Result<()> {
        if !err.is_transient() {
            return Ok(());
        }
        let implicated_live = stmt.is_none_or(|s| self.registry.contains_statement(s.id()));
        if implicated_live {
            tracing::warn!(
                code = err.code(),
                error = %exception_string(err),
                "transient database error, rebuilding connection"
            );
            self.rebuild_once_locked(state).await?;
        }
        Ok(())
    }

    /// Commit the current transaction. Best effort: failures are logged
    /// and swallowed; a transient failure additionally triggers one
    /// bounded reconnect. No-op when disconnected.
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn commit(&self) {
        self.end_transaction(true).await;
    }

    /// Roll back the current transaction. Same error policy as
    /// [`commit`](Self::commit).
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn rollback(&self) {
        self.end_transaction(false).await;
    }

    async fn end_transaction(&self, commit: bool) {
        let op = if commit { "commit" } else { "rollback" };
        let mut state = self.state.lock().await;
        let Some(conn) = state.conn.clone() else {
            return;
        };

        let result = if commit {
            conn.commit().await
        } else {
            conn.rollback().await
        };

        if let Err(err) = result {
            tracing::warn!(op, code = err.code(), error = %exception_string(&err), "transaction control failed, error swallowed");
            if let Err(rebuild) = self.handle_db_error(&mut state, &err, None).await {
                tracing::warn!(op, error = %rebuild, "reconnect after transaction control failure did not succeed");
            }
        }
    }

    /// Best-effort teardown: rolls back whatever is pending, then releases
    /// the connection and environment. Failures are logged, never
    /// returned; after this call the session is disconnected.
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn close(&self) {
        self.rollback().await;

        let mut state = self.state.lock().await;
        let live = self.registry.live_statements();
        if live > 0 {
            tracing::warn!(live, "closing session with unterminated statements");
        }

        if let Some(conn) = state.conn.take() {
            if let Err(err) = conn.close().await {
                tracing::error!(error = %exception_string(&err), "failed to close database connection");
            }
        }
        if let Some(env) = state.env.take() {
            if let Err(err) = env.close().await {
                tracing::error!(error = %exception_string(&err), "failed to shut down client environment");
            }
        }
        self.registry.invalidate_all();
    }

    /// Prepare a statement against the live connection and register its
    /// handle.
    pub async fn create_statement(&self, sql: &str) -> Result<Statement> {
        let mut state = self.state.lock().await;
        let conn = state.conn.clone().ok_or(TenaxError::NotConnected)?;

        match conn.prepare(sql).await {
            Ok(raw) => {
                let id = self.registry.register_statement();
                tracing::trace!(%id, "statement created");
                Ok(Statement::new(id, raw))
            }
            Err(err) => {
                self.handle_db_error(&mut state, &err, None).await?;
                Err(err.into())
            }
        }
    }

    /// Terminate a statement handle. Idempotent: a handle that is no
    /// longer registered is left alone, and close failures are only
    /// logged.
    pub async fn terminate_statement(&self, stmt: &Statement) {
        let _state = self.state.lock().await;
        if !self.registry.unregister_statement(stmt.id()) {
            return;
        }
        if let Err(err) = stmt.raw().close().await {
            tracing::warn!(id = %stmt.id(), error = %exception_string(&err), "failed to terminate statement");
        }
    }

    /// Close a result set and terminate the statement that produced it.
    /// Idempotent like [`terminate_statement`](Self::terminate_statement).
    pub async fn close_result_set(&self, rs: &ResultSet) {
        {
            let _state = self.state.lock().await;
            if !self.registry.unregister_result_set(rs.id()) {
                return;
            }
            if let Err(err) = rs.raw().close().await {
                tracing::warn!(id = %rs.id(), error = %exception_string(&err), "failed to close result set");
            }
        }
        self.terminate_statement(rs.statement()).await;
    }

    /// Advance an open cursor. Fails with [`TenaxError::StaleHandle`] when
    /// the result set is closed or was invalidated by a reconnect.
    pub async fn next(&self, rs: &ResultSet) -> Result<bool> {
        let _state = self.state.lock().await;
        if !self.registry.contains_result_set(rs.id()) {
            return Err(TenaxError::StaleHandle(rs.id().to_string()));
        }
        Ok(rs.raw().next().await?)
    }

    /// The row an open cursor is positioned on.
    pub fn current_row(&self, rs: &ResultSet) -> Result<Row> {
        if !self.registry.contains_result_set(rs.id()) {
            return Err(TenaxError::StaleHandle(rs.id().to_string()));
        }
        Ok(rs.raw().current()?)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("driver", &self.driver.name())
            .field("generation", &self.registry.generation())
            .finish()
    }
}
