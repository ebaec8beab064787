//! Session configuration

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenax_core::Result;

/// Delay between retry attempts unless configured otherwise.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

const DEFAULT_STATEMENT_CACHE_SIZE: u32 = 20;

/// Credentials and target descriptor for one database session.
///
/// All three strings are opaque to this layer; their format is owned by
/// the protocol client.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name
    pub user: String,
    /// Account secret
    pub password: String,
    /// Connect descriptor (host, service, ...)
    pub target: String,
}

impl Credentials {
    /// Create credentials for the given account and target.
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            target: target.into(),
        }
    }
}

// The password must never reach logs through a Debug rendering.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("target", &self.target)
            .finish()
    }
}

/// Retry pacing shared by every retry loop of a session: the connect loop
/// and the `ensure_*` execution loops.
///
/// The delay is fixed, not exponential; a lost database session gains
/// nothing from backing off further, and the cadence keeps periodic
/// diagnostics readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    delay_ms: u64,
}

impl RetryPolicy {
    /// Create a policy with the given fixed delay between attempts.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Delay to sleep between attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    /// Default pacing: 30 seconds between attempts.
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

fn default_statement_cache_size() -> u32 {
    DEFAULT_STATEMENT_CACHE_SIZE
}

/// Configuration of a [`Session`](crate::Session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Who to connect as, and where.
    pub credentials: Credentials,

    /// Retry pacing for connect and ensure loops.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Prepared-statement cache size configured on every fresh connection.
    #[serde(default = "default_statement_cache_size")]
    pub statement_cache_size: u32,
}

impl SessionConfig {
    /// Create a configuration with default retry pacing and cache size.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            retry: RetryPolicy::default(),
            statement_cache_size: DEFAULT_STATEMENT_CACHE_SIZE,
        }
    }

    /// Set the fixed delay between retry attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry = RetryPolicy::new(delay);
        self
    }

    /// Set the prepared-statement cache size.
    pub fn with_statement_cache_size(mut self, slots: u32) -> Self {
        self.statement_cache_size = slots;
        self
    }

    /// Load a configuration from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save the configuration to a JSON file, creating parent directories
    /// as needed.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials::new("scott", "tiger", "db.example:1521/orcl");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("scott"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("tiger"));
    }

    #[test]
    fn retry_policy_defaults_to_thirty_seconds() {
        assert_eq!(RetryPolicy::default().delay(), Duration::from_secs(30));
        assert_eq!(
            RetryPolicy::new(Duration::from_millis(5)).delay(),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SessionConfig::new(Credentials::new("u", "p", "t"))
            .with_retry_delay(Duration::from_millis(250))
            .with_statement_cache_size(7);

        let json = serde_json::to_string(&config).unwrap();
        let back: SessionConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.credentials.user, "u");
        assert_eq!(back.retry.delay(), Duration::from_millis(250));
        assert_eq!(back.statement_cache_size, 7);
    }

    #[test]
    fn config_defaults_apply_to_sparse_json() {
        let json = r#"{"credentials":{"user":"u","password":"p","target":"t"}}"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.statement_cache_size, 20);
    }

    #[tokio::test]
    async fn config_saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let config = SessionConfig::new(Credentials::new("u", "p", "t"));
        config.save(&path).await.unwrap();

        let loaded = SessionConfig::load(&path).await.unwrap();
        assert_eq!(loaded.credentials.target, "t");
        assert_eq!(loaded.retry, config.retry);
    }
}
