use crate::sql::{Dialect, Statement};
use crate::value::{Fields, Value};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::{MySql, MySqlPool, MySqlRow};
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Column, ColumnIndex, Decode, Executor, Row, Type};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A driver-level failure, before it is classified against a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The database rejected the statement.
    #[error("{}{message}", code_prefix(.code))]
    Database {
        code: Option<String>,
        message: String,
    },
    /// No connection could be acquired in time.
    #[error("connection acquire timed out")]
    Timeout,
    /// The pool is closed or the server cannot be reached.
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Other(String),
}

fn code_prefix(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!("[{c}] ")).unwrap_or_default()
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => EngineError::Database {
                code: db.code().map(|c| c.into_owned()),
                message: db.message().to_string(),
            },
            sqlx::Error::PoolTimedOut => EngineError::Timeout,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => EngineError::Unavailable(err.to_string()),
            other => EngineError::Other(other.to_string()),
        }
    }
}

/// What a non-row-returning statement reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// Executes parameterized SQL on behalf of models.
///
/// Models only borrow an engine; they never open, close or reconfigure it.
#[async_trait]
pub trait QueryEngine: fmt::Debug + Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Runs a statement that yields rows.
    async fn fetch(&self, stmt: Statement) -> Result<Vec<Fields>, EngineError>;

    /// Runs a statement for its side effect.
    async fn execute(&self, stmt: Statement) -> Result<ExecOutcome, EngineError>;
}

/// A native sqlx pool for one of the supported drivers.
#[derive(Debug, Clone)]
pub enum Pool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
    MySql(MySqlPool),
}

impl Pool {
    pub fn dialect(&self) -> Dialect {
        match self {
            Pool::Postgres(_) => Dialect::Postgres,
            Pool::Sqlite(_) => Dialect::Sqlite,
            Pool::MySql(_) => Dialect::MySql,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Pool::Postgres(pool) => pool.is_closed(),
            Pool::Sqlite(pool) => pool.is_closed(),
            Pool::MySql(pool) => pool.is_closed(),
        }
    }

    pub async fn close(&self) {
        match self {
            Pool::Postgres(pool) => pool.close().await,
            Pool::Sqlite(pool) => pool.close().await,
            Pool::MySql(pool) => pool.close().await,
        }
    }

    pub fn as_postgres(&self) -> Option<&PgPool> {
        match self {
            Pool::Postgres(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            Pool::Sqlite(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            Pool::MySql(pool) => Some(pool),
            _ => None,
        }
    }

    /// Runs unparameterized SQL such as DDL and returns the affected row count.
    pub async fn execute(&self, sql: &str) -> Result<u64, EngineError> {
        log::debug!("raw: {sql}");
        let rows_affected = match self {
            Pool::Postgres(pool) => pool.execute(sql).await?.rows_affected(),
            Pool::Sqlite(pool) => pool.execute(sql).await?.rows_affected(),
            Pool::MySql(pool) => pool.execute(sql).await?.rows_affected(),
        };
        Ok(rows_affected)
    }
}

/// [`QueryEngine`] over a native sqlx pool.
#[derive(Debug, Clone)]
pub struct SqlxEngine {
    pool: Pool,
}

impl SqlxEngine {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// Same binding rules for every driver; only the sqlx database type differs.
macro_rules! bind_params {
    ($db:ty, $sql:expr, $params:expr) => {{
        let mut query = sqlx::query::<$db>($sql);
        for value in $params {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(v) => query.bind(v),
                Value::Int(v) => query.bind(v),
                Value::Float(v) => query.bind(v),
                Value::String(v) => query.bind(v),
                Value::Date(v) => query.bind(v.to_rfc3339()),
                Value::Json(v) => query.bind(v.to_string()),
            };
        }
        query
    }};
}

/// Decodes column `index` as `T`, or `None` if the column is not a `T`.
fn try_decode<'r, R, T>(row: &'r R, index: usize) -> Option<Value>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
    Value: From<Option<T>>,
{
    row.try_get::<Option<T>, _>(index).ok().map(Value::from)
}

fn decode_pg(row: &PgRow, i: usize) -> Option<Value> {
    try_decode::<_, i64>(row, i)
        .or_else(|| try_decode::<_, i32>(row, i))
        .or_else(|| try_decode::<_, i16>(row, i))
        .or_else(|| try_decode::<_, f64>(row, i))
        .or_else(|| try_decode::<_, f32>(row, i))
        .or_else(|| try_decode::<_, bool>(row, i))
        .or_else(|| try_decode::<_, String>(row, i))
        .or_else(|| try_decode::<_, DateTime<Utc>>(row, i))
        .or_else(|| try_decode::<_, NaiveDateTime>(row, i))
        .or_else(|| try_decode::<_, serde_json::Value>(row, i))
        .or_else(|| try_decode::<_, Uuid>(row, i))
}

fn decode_sqlite(row: &SqliteRow, i: usize) -> Option<Value> {
    try_decode::<_, i64>(row, i)
        .or_else(|| try_decode::<_, f64>(row, i))
        .or_else(|| try_decode::<_, bool>(row, i))
        .or_else(|| try_decode::<_, String>(row, i))
        .or_else(|| try_decode::<_, DateTime<Utc>>(row, i))
}

fn decode_mysql(row: &MySqlRow, i: usize) -> Option<Value> {
    try_decode::<_, i64>(row, i)
        .or_else(|| try_decode::<_, i32>(row, i))
        .or_else(|| try_decode::<_, f64>(row, i))
        .or_else(|| try_decode::<_, f32>(row, i))
        .or_else(|| try_decode::<_, bool>(row, i))
        .or_else(|| try_decode::<_, String>(row, i))
        .or_else(|| try_decode::<_, DateTime<Utc>>(row, i))
        .or_else(|| try_decode::<_, NaiveDateTime>(row, i))
        .or_else(|| try_decode::<_, serde_json::Value>(row, i))
}

/// Decodes a row column by column, trying the narrowest type first.
/// Columns no decoder accepts come back as `Null`.
fn decode_row<R: Row>(row: &R, decode: fn(&R, usize) -> Option<Value>) -> Fields {
    let mut fields = Fields::new();
    for (index, col) in row.columns().iter().enumerate() {
        let value = decode(row, index).unwrap_or_else(|| {
            log::debug!("column `{}` could not be decoded", col.name());
            Value::Null
        });
        fields.insert(col.name(), value);
    }
    fields
}

#[async_trait]
impl QueryEngine for SqlxEngine {
    fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    async fn fetch(&self, stmt: Statement) -> Result<Vec<Fields>, EngineError> {
        log::debug!("fetch: {}", stmt.sql);
        let Statement { sql, params } = stmt;
        let rows: Vec<Fields> = match &self.pool {
            Pool::Postgres(pool) => bind_params!(Postgres, &sql, params)
                .fetch_all(pool)
                .await?
                .iter()
                .map(|row| decode_row(row, decode_pg))
                .collect(),
            Pool::Sqlite(pool) => bind_params!(Sqlite, &sql, params)
                .fetch_all(pool)
                .await?
                .iter()
                .map(|row| decode_row(row, decode_sqlite))
                .collect(),
            Pool::MySql(pool) => bind_params!(MySql, &sql, params)
                .fetch_all(pool)
                .await?
                .iter()
                .map(|row| decode_row(row, decode_mysql))
                .collect(),
        };
        Ok(rows)
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecOutcome, EngineError> {
        log::debug!("execute: {}", stmt.sql);
        let Statement { sql, params } = stmt;
        let outcome = match &self.pool {
            Pool::Postgres(pool) => {
                let result = bind_params!(Postgres, &sql, params).execute(pool).await?;
                ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: None,
                }
            }
            Pool::Sqlite(pool) => {
                let result = bind_params!(Sqlite, &sql, params).execute(pool).await?;
                ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: Some(result.last_insert_rowid()),
                }
            }
            Pool::MySql(pool) => {
                let result = bind_params!(MySql, &sql, params).execute(pool).await?;
                ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: i64::try_from(result.last_insert_id()).ok(),
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn pool_errors_map_to_connection_kinds() {
        assert_eq!(EngineError::from(sqlx::Error::PoolTimedOut), EngineError::Timeout);
        assert!(matches!(
            EngineError::from(sqlx::Error::PoolClosed),
            EngineError::Unavailable(_)
        ));
        assert!(matches!(
            EngineError::from(sqlx::Error::RowNotFound),
            EngineError::Other(_)
        ));
    }

    #[test]
    fn display_includes_database_code() {
        let err = EngineError::Database {
            code: Some("42703".into()),
            message: "column \"title\" does not exist".into(),
        };
        assert_eq!(err.to_string(), "[42703] column \"title\" does not exist");

        let err = EngineError::Database {
            code: None,
            message: "no such table: test".into(),
        };
        assert_eq!(err.to_string(), "no such table: test");
    }

    #[tokio::test]
    async fn decodes_boolean_and_text_columns() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let engine = SqlxEngine::new(Pool::Sqlite(pool));
        engine
            .pool()
            .execute("CREATE TABLE flags (id INTEGER PRIMARY KEY, active BOOLEAN, label TEXT)")
            .await
            .unwrap();

        let mut insert = Statement::new("INSERT INTO flags (active, label) VALUES (?, ?)");
        insert.params = vec![Value::Bool(true), Value::from("on")];
        let outcome = engine.execute(insert).await.unwrap();
        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.last_insert_id, Some(1));

        let rows = engine
            .fetch(Statement::new("SELECT id, active, label FROM flags"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
        assert!(matches!(
            rows[0].get("active"),
            Some(Value::Bool(true) | Value::Int(1))
        ));
        assert_eq!(rows[0].get("label"), Some(&Value::from("on")));
    }
}
