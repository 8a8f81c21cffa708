use crate::config::{Client, ConnectConfig};
use crate::engine::{EngineError, Pool, SqlxEngine};
use crate::error::{ConnectionError, Error, Result};
use crate::model::{Model, ModelOptions};
use crate::sql::Dialect;
use sqlx::Executor;
use sqlx::pool::PoolOptions;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

/// Owns the connection pool and hands out [`Model`]s that share it.
///
/// Each `Database` is an explicit object; models borrow its engine through a
/// reference-counted handle and never close or reconfigure the pool.
#[derive(Debug, Default)]
pub struct Database {
    engine: Option<Arc<SqlxEngine>>,
}

fn pool_options<DB: sqlx::Database>(config: &ConnectConfig) -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .min_connections(config.pool.min)
        .max_connections(config.pool.max)
        .acquire_timeout(config.acquire_timeout())
}

fn connect_error(err: sqlx::Error) -> Error {
    match EngineError::from(err) {
        EngineError::Timeout => Error::Connection(ConnectionError::Timeout),
        other => Error::unavailable(other.to_string()),
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| !e.pool().is_closed())
    }

    // -------- Open the pool --------
    pub async fn connect(&mut self, config: &ConnectConfig) -> Result<()> {
        if self.is_connected() {
            return Err(Error::Config("database is already connected".into()));
        }
        config.validate()?;

        let search_paths = config.search_paths();
        if !search_paths.is_empty() && config.client != Client::Postgres {
            log::warn!(
                "search path `{}` ignored for {:?}",
                search_paths.join(","),
                config.client
            );
        }

        let url = config.connection.as_str();
        let pool = match config.client {
            Client::Postgres => {
                let mut options: PgPoolOptions = pool_options(config);
                if !search_paths.is_empty() {
                    let set = format!(
                        "SET search_path TO {}",
                        search_paths
                            .iter()
                            .map(|s| Dialect::Postgres.quote_ident(s))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    options = options.after_connect(move |conn, _meta| {
                        let set = set.clone();
                        Box::pin(async move {
                            conn.execute(set.as_str()).await?;
                            Ok(())
                        })
                    });
                }
                Pool::Postgres(options.connect(url).await.map_err(connect_error)?)
            }
            Client::Sqlite => Pool::Sqlite(
                pool_options::<sqlx::Sqlite>(config)
                    .connect(url)
                    .await
                    .map_err(connect_error)?,
            ),
            Client::MySql => Pool::MySql(
                pool_options::<sqlx::MySql>(config)
                    .connect(url)
                    .await
                    .map_err(connect_error)?,
            ),
        };

        log::info!(
            "connected to {:?} database (pool {}..={})",
            config.client,
            config.pool.min,
            config.pool.max
        );
        self.engine = Some(Arc::new(SqlxEngine::new(pool)));
        Ok(())
    }

    // -------- Close the pool --------
    /// Closes the pool. Models created from this database fail with a
    /// connection error afterwards.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(engine) = self.engine.take() {
            engine.close().await;
            log::info!("disconnected");
        }
        Ok(())
    }

    /// Binds a model to `table`. No round trip is made; a schema that
    /// disagrees with the physical table surfaces on the first write.
    pub fn model(&self, table: &str, options: ModelOptions) -> Result<Model> {
        if table.trim().is_empty() {
            return Err(Error::Config("table name is empty".into()));
        }
        let engine = self.engine()?;
        Ok(Model::new(table, options, engine))
    }

    /// The raw pool, for DDL and test setup.
    pub fn connection(&self) -> Result<&Pool> {
        match &self.engine {
            Some(engine) => Ok(engine.pool()),
            None => Err(Error::unavailable("database is not connected")),
        }
    }

    fn engine(&self) -> Result<Arc<SqlxEngine>> {
        self.engine
            .clone()
            .ok_or_else(|| Error::unavailable("database is not connected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_requires_connection() {
        let db = Database::new();
        assert!(!db.is_connected());

        let err = db.model("test", ModelOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::Unavailable { .. })
        ));
        assert!(db.connection().is_err());
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_noop() {
        let mut db = Database::new();
        db.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn connect_rejects_invalid_config() {
        let mut db = Database::new();
        let config = ConnectConfig::new(Client::Postgres, "sqlite::memory:");
        assert!(matches!(db.connect(&config).await, Err(Error::Config(_))));
        assert!(!db.is_connected());
    }
}
