use crate::engine::QueryEngine;
use crate::error::{Error, Result};
use crate::sql::{self, Cmp, Direction, Filter, Select, Statement};
use crate::value::{Fields, Value};
use std::fmt;
use std::sync::Arc;

/// Kind of DML statement a [`QueryResult`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Insert,
    Update,
    Delete,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Insert => "INSERT",
            Command::Update => "UPDATE",
            Command::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver metadata for a statement run through [`QueryBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResult {
    pub command: Command,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// Raw query access to one table, returned by
/// [`Model::raw_qry`](crate::Model::raw_qry).
///
/// Rows come back as plain [`Fields`], not documents, and writes skip schema
/// validation. Database failures still use the crate error taxonomy.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    engine: Arc<dyn QueryEngine>,
    query: Select,
}

impl QueryBuilder {
    pub(crate) fn new(table: String, engine: Arc<dyn QueryEngine>) -> Self {
        Self {
            table,
            engine,
            query: Select::default(),
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.query.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn r#where(mut self, column: &str, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter {
            column: column.to_string(),
            cmp,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.r#where(column, Cmp::Eq, value)
    }

    /// Substring match; the pattern is wrapped in `%` automatically.
    pub fn like(self, column: &str, pattern: &str) -> Self {
        self.r#where(column, Cmp::Like, format!("%{pattern}%"))
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.query.order_by.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.query.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.query.offset = Some(n);
        self
    }

    /// The SELECT this builder would run.
    pub fn to_statement(&self) -> Statement {
        sql::select(self.engine.dialect(), &self.table, &self.query)
    }

    pub async fn fetch_all(&self) -> Result<Vec<Fields>> {
        self.engine
            .fetch(self.to_statement())
            .await
            .map_err(|e| Error::from_engine(e, &self.table))
    }

    pub async fn first(self) -> Result<Option<Fields>> {
        let rows = self.limit(1).fetch_all().await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert(&self, fields: Fields) -> Result<QueryResult> {
        let stmt = sql::insert(self.engine.dialect(), &self.table, &fields, false);
        self.run(Command::Insert, stmt).await
    }

    /// Updates every row matching the filters; with no filters that is the
    /// whole table.
    pub async fn update(&self, fields: Fields) -> Result<QueryResult> {
        if fields.is_empty() {
            return Ok(QueryResult {
                command: Command::Update,
                rows_affected: 0,
                last_insert_id: None,
            });
        }
        let stmt = sql::update(
            self.engine.dialect(),
            &self.table,
            &fields,
            &self.query.filters,
        );
        self.run(Command::Update, stmt).await
    }

    /// Deletes every row matching the filters; with no filters that is the
    /// whole table.
    pub async fn delete(&self) -> Result<QueryResult> {
        let stmt = sql::delete(self.engine.dialect(), &self.table, &self.query.filters);
        self.run(Command::Delete, stmt).await
    }

    async fn run(&self, command: Command, stmt: Statement) -> Result<QueryResult> {
        let outcome = self
            .engine
            .execute(stmt)
            .await
            .map_err(|e| Error::from_engine(e, &self.table))?;
        Ok(QueryResult {
            command,
            rows_affected: outcome.rows_affected,
            last_insert_id: outcome.last_insert_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, ExecOutcome};
    use crate::sql::Dialect;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Offline(Dialect);

    #[async_trait]
    impl QueryEngine for Offline {
        fn dialect(&self) -> Dialect {
            self.0
        }

        async fn fetch(&self, _stmt: Statement) -> std::result::Result<Vec<Fields>, EngineError> {
            Err(EngineError::Unavailable("offline".into()))
        }

        async fn execute(&self, _stmt: Statement) -> std::result::Result<ExecOutcome, EngineError> {
            Ok(ExecOutcome {
                rows_affected: 2,
                last_insert_id: None,
            })
        }
    }

    fn builder(dialect: Dialect) -> QueryBuilder {
        QueryBuilder::new("test".into(), Arc::new(Offline(dialect)))
    }

    #[test]
    fn builds_filtered_select() {
        let stmt = builder(Dialect::Postgres)
            .select(&["name"])
            .like("name", "oh")
            .r#where("age", Cmp::Lt, 30)
            .order_by("name", Direction::Asc)
            .limit(5)
            .to_statement();

        assert_eq!(
            stmt.sql,
            "SELECT \"name\" FROM \"test\" WHERE \"name\" LIKE $1 AND \"age\" < $2 ORDER BY \"name\" ASC LIMIT 5"
        );
        assert_eq!(stmt.params, vec![Value::from("%oh%"), Value::Int(30)]);
    }

    #[tokio::test]
    async fn reports_command_tags() {
        let qb = builder(Dialect::Sqlite).where_eq("name", "john");

        let ret = qb.insert(Fields::from([("name", "john")])).await.unwrap();
        assert_eq!(ret.command.to_string(), "INSERT");

        let ret = qb.update(Fields::from([("name", "mark")])).await.unwrap();
        assert_eq!(ret.command, Command::Update);
        assert_eq!(ret.rows_affected, 2);

        let ret = qb.delete().await.unwrap();
        assert_eq!(ret.command.as_str(), "DELETE");
    }

    #[tokio::test]
    async fn fetch_failures_use_crate_errors() {
        let err = builder(Dialect::Sqlite).fetch_all().await.unwrap_err();
        assert!(err.is_connection());
    }
}
