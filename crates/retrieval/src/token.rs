//! Access-token acquisition for the search backend.
//!
//! An explicitly configured token is used as-is. Otherwise tokens come from
//! an external credential command and are cached for a freshness window;
//! refreshes are serialized so concurrent callers trigger a single fetch.
//! Each fetch runs under a timeout while it holds the refresh lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use courier_config::RetrievalConfig;
use courier_core::RetrievalError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Where fresh tokens come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<String, RetrievalError>;
}

/// Runs a credential command (e.g. `gcloud auth application-default
/// print-access-token`) and reads the token from stdout.
pub struct CommandTokenSource {
    command: String,
}

impl CommandTokenSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl TokenSource for CommandTokenSource {
    async fn fetch(&self) -> Result<String, RetrievalError> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| RetrievalError::Credential("token command is empty".into()))?;

        let output = tokio::process::Command::new(program)
            .args(parts)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RetrievalError::Credential(format!("failed to run `{}`: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RetrievalError::Credential(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(RetrievalError::Credential(format!(
                "`{}` printed no token",
                self.command
            )));
        }
        Ok(token)
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    fetched_at: DateTime<Utc>,
}

/// Shared, time-boxed access-token cache.
pub struct AccessTokenCache {
    explicit: Option<String>,
    source: Arc<dyn TokenSource>,
    refresh_after: TimeDelta,
    fetch_timeout: Duration,
    clock: Clock,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenCache {
    pub fn new(source: Arc<dyn TokenSource>, refresh_after_secs: u64) -> Self {
        Self {
            explicit: None,
            source,
            refresh_after: i64::try_from(refresh_after_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            fetch_timeout: Duration::from_secs(30),
            clock: Arc::new(Utc::now),
            cached: Mutex::new(None),
        }
    }

    /// A cache that always answers with `token` and never runs the source.
    pub fn with_explicit(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.explicit = Some(token).filter(|t| !t.trim().is_empty());
        self
    }

    /// Upper bound on one token fetch.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Replace the wall clock used for freshness checks.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        let cache = Self::new(
            Arc::new(CommandTokenSource::new(&config.token_command)),
            config.token_refresh_secs,
        )
        .with_fetch_timeout(Duration::from_secs(config.token_timeout_secs));
        match config.explicit_token() {
            Some(token) => cache.with_explicit(token),
            None => cache,
        }
    }

    /// A usable bearer token.
    pub async fn token(&self) -> Result<String, RetrievalError> {
        if let Some(token) = &self.explicit {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        let now = (self.clock)();
        if let Some(entry) = cached.as_ref() {
            if now - entry.fetched_at < self.refresh_after {
                debug!("Using cached access token");
                return Ok(entry.token.clone());
            }
        }

        info!("Refreshing access token");
        let token = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.fetch_timeout.as_secs(), "Access token fetch timed out");
                RetrievalError::Timeout(format!(
                    "access token fetch exceeded {}s",
                    self.fetch_timeout.as_secs()
                ))
            })??;
        *cached = Some(CachedToken {
            token: token.clone(),
            fetched_at: now,
        });
        Ok(token)
    }
}
