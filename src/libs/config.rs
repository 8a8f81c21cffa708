use crate::error::{Error, Result};
use crate::sql::Dialect;
use serde::Deserialize;
use std::time::Duration;

/// Database driver named in a [`ConnectConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Client {
    #[serde(alias = "pg", alias = "postgresql")]
    Postgres,
    #[serde(alias = "sqlite3")]
    Sqlite,
    #[serde(alias = "mysql2")]
    MySql,
}

impl Client {
    pub fn dialect(&self) -> Dialect {
        match self {
            Client::Postgres => Dialect::Postgres,
            Client::Sqlite => Dialect::Sqlite,
            Client::MySql => Dialect::MySql,
        }
    }

    fn schemes(&self) -> &'static [&'static str] {
        match self {
            Client::Postgres => &["postgres", "postgresql"],
            Client::Sqlite => &["sqlite"],
            Client::MySql => &["mysql", "mariadb"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PoolBounds {
    #[serde(default)]
    pub min: u32,
    #[serde(default = "default_pool_max")]
    pub max: u32,
}

impl Default for PoolBounds {
    fn default() -> Self {
        Self {
            min: 0,
            max: default_pool_max(),
        }
    }
}

fn default_pool_max() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30_000
}

/// Everything [`Database::connect`](crate::Database::connect) needs.
///
/// Deserializes from the camelCase shape
/// `{"client": "pg", "connection": "...", "searchPaths": "app",
/// "acquireConnectionTimeout": 1000, "pool": {"min": 0, "max": 1}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectConfig {
    pub client: Client,
    pub connection: String,
    #[serde(default, rename = "searchPaths", alias = "searchPath")]
    pub search_path: Option<String>,
    /// Milliseconds to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout", rename = "acquireConnectionTimeout")]
    pub acquire_timeout_ms: u64,
    #[serde(default)]
    pub pool: PoolBounds,
}

impl ConnectConfig {
    pub fn new(client: Client, connection: impl Into<String>) -> Self {
        Self {
            client,
            connection: connection.into(),
            search_path: None,
            acquire_timeout_ms: default_acquire_timeout(),
            pool: PoolBounds::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid connect config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_search_path(mut self, search_path: impl Into<String>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_pool(mut self, min: u32, max: u32) -> Self {
        self.pool = PoolBounds { min, max };
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Schema names from `search_path`, comma separated, blanks dropped.
    pub fn search_paths(&self) -> Vec<&str> {
        self.search_path
            .as_deref()
            .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.trim().is_empty() {
            return Err(Error::Config("connection string is empty".into()));
        }
        if self.pool.max == 0 {
            return Err(Error::Config("pool.max must be at least 1".into()));
        }
        if self.pool.min > self.pool.max {
            return Err(Error::Config(format!(
                "pool.min ({}) exceeds pool.max ({})",
                self.pool.min, self.pool.max
            )));
        }

        let scheme = self
            .connection
            .split_once(':')
            .map(|(scheme, _)| scheme.to_lowercase())
            .unwrap_or_default();
        if !self.client.schemes().contains(&scheme.as_str()) {
            return Err(Error::Config(format!(
                "connection string scheme `{scheme}` does not match client {:?}",
                self.client
            )));
        }
        Ok(())
    }
}
