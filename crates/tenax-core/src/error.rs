//! Error types for tenax

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Error codes reported by the server when the session or the network
/// underneath it is gone: session killed, not logged on, end-of-file on the
/// communication channel, connection lost contact, and the listener-side
/// refusals raised while the service is unreachable.
const TRANSIENT_CODES: &[u32] = &[28, 1012, 3113, 3114, 3135, 12514, 12537, 12541];

/// Classification of a database error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The session or the connection underneath it was lost; eligible for
    /// reconnect-and-retry.
    Transient,
    /// Any other database-reported failure (bad SQL, constraint violation,
    /// batch partial failure, ...); never retried by the reconnect mechanism.
    Fatal,
}

/// An error reported by the database client, carrying the numeric server
/// error code and the server message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DbError {
    code: u32,
    message: String,
    batch: bool,
}

impl DbError {
    /// Create a new database error.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            batch: false,
        }
    }

    /// Create a batch partial-failure error (some rows of a batched
    /// statement failed while others were applied).
    pub fn batch(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            batch: true,
        }
    }

    /// The numeric error code reported by the server.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// The server message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this is a batch partial failure.
    pub fn is_batch(&self) -> bool {
        self.batch
    }

    /// Classify this error as transient (connection loss) or fatal.
    ///
    /// Pure: the decision depends only on the numeric code.
    pub fn kind(&self) -> ErrorKind {
        if TRANSIENT_CODES.contains(&self.code) {
            ErrorKind::Transient
        } else {
            ErrorKind::Fatal
        }
    }

    /// Shorthand for `kind() == ErrorKind::Transient`.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Error type for session-layer operations.
#[derive(Debug, Error)]
pub enum TenaxError {
    /// The database reported an error; classify via [`DbError::kind`].
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// An operation was attempted on a statement or result-set handle that
    /// is no longer registered (closed, or invalidated by a reconnect).
    #[error("stale handle: {0}")]
    StaleHandle(String),

    /// The session has no open connection; call `connect` first.
    #[error("not connected")]
    NotConnected,

    /// Initial connect or a bounded reconnect failed.
    #[error("failed to connect to database: {0}")]
    Connect(String),

    /// A caller-supplied row callback failed with a non-database error.
    #[error("row callback failed: {0}")]
    Callback(#[source] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TenaxError {
    /// The underlying database error, if any.
    pub fn as_db(&self) -> Option<&DbError> {
        match self {
            TenaxError::Db(db) => Some(db),
            _ => None,
        }
    }
}

/// Result type alias for session-layer operations.
pub type Result<T> = std::result::Result<T, TenaxError>;

/// Result type alias for the raw client interface.
pub type DbResult<T> = std::result::Result<T, DbError>;

// Server messages separate sentences with double spaces once newlines are
// collapsed; the prefix pattern relies on that terminator.
static CODE_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{2,5}-\d+: (.*?)(  |$)").expect("valid regex"));

/// Render a database error as a single log-friendly line.
pub fn exception_string(err: &DbError) -> String {
    err.message().replace('\n', "  ")
}

/// Strip a leading vendor error-code prefix (`XXX-nnnnn: `) from a server
/// message, keeping only the first human-readable sentence. Best effort:
/// text without a recognizable prefix is returned unchanged.
pub fn simple_error_message(text: &str) -> String {
    match CODE_PREFIX_REGEX.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_classify_as_transient() {
        for code in [28, 1012, 3113, 3114, 3135, 12514, 12537, 12541] {
            let err = DbError::new(code, "lost");
            assert_eq!(err.kind(), ErrorKind::Transient, "code {code}");
            assert!(err.is_transient());
        }
    }

    #[test]
    fn other_codes_classify_as_fatal() {
        for code in [0, 1, 942, 1017, 1400, 12899] {
            let err = DbError::new(code, "nope");
            assert_eq!(err.kind(), ErrorKind::Fatal, "code {code}");
        }
    }

    #[test]
    fn batch_errors_keep_their_code_and_flag() {
        let err = DbError::batch(24381, "error(s) in array DML");
        assert!(err.is_batch());
        assert_eq!(err.code(), 24381);
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn exception_string_collapses_newlines() {
        let err = DbError::new(942, "table or view does not exist\nline 1");
        assert_eq!(exception_string(&err), "table or view does not exist  line 1");
    }

    #[test]
    fn simple_error_message_strips_code_prefix() {
        assert_eq!(
            simple_error_message("ORA-00942: table or view does not exist"),
            "table or view does not exist"
        );
    }

    #[test]
    fn simple_error_message_keeps_first_sentence_only() {
        let text = "ORA-01400: cannot insert NULL into (\"T\".\"C\")  Help: https://example";
        assert_eq!(simple_error_message(text), "cannot insert NULL into (\"T\".\"C\")");
    }

    #[test]
    fn simple_error_message_passes_through_plain_text() {
        assert_eq!(simple_error_message("no prefix here"), "no prefix here");
        assert_eq!(simple_error_message(""), "");
    }

    #[test]
    fn as_db_exposes_the_database_error() {
        let err = TenaxError::from(DbError::new(3113, "eof"));
        assert_eq!(err.as_db().map(DbError::code), Some(3113));
        assert!(TenaxError::NotConnected.as_db().is_none());
    }
}
