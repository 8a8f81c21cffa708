use crate::value::{Fields, Value};
use std::fmt;

/// SQL flavor spoken by the connected database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
    MySql,
}

impl Dialect {
    /// Quotes an identifier. Dotted names (`schema.table`) are quoted part
    /// by part.
    pub fn quote_ident(&self, ident: &str) -> String {
        let quote = match self {
            Dialect::MySql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        };
        ident
            .split('.')
            .map(|part| {
                let escaped = part.replace(quote, &format!("{quote}{quote}"));
                format!("{quote}{escaped}{quote}")
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn supports_returning(&self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }
}

/// A SQL string with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Cmp {
    fn as_sql(&self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "<>",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
            Cmp::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pub column: String,
    pub cmp: Cmp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            cmp: Cmp::Eq,
            value,
        }
    }
}

/// Accumulates bound parameters while SQL text is being written.
struct Params {
    dialect: Dialect,
    values: Vec<Value>,
}

impl Params {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// Returns the SQL fragment standing for `value`. Nulls are written as a
    /// literal so no driver has to guess a parameter type for them.
    fn push(&mut self, value: &Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.values.push(value.clone());
        let placeholder = self.dialect.placeholder(self.values.len());
        match (self.dialect, value) {
            (Dialect::Postgres, Value::Date(_)) => format!("CAST({placeholder} AS TIMESTAMPTZ)"),
            (Dialect::Postgres, Value::Json(_)) => format!("CAST({placeholder} AS JSONB)"),
            _ => placeholder,
        }
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.values,
        }
    }
}

fn where_clause(dialect: Dialect, filters: &[Filter], params: &mut Params) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let conds: Vec<String> = filters
        .iter()
        .map(|f| {
            let column = dialect.quote_ident(&f.column);
            match (f.cmp, &f.value) {
                (Cmp::Eq, Value::Null) => format!("{column} IS NULL"),
                (Cmp::Ne, Value::Null) => format!("{column} IS NOT NULL"),
                (cmp, value) => format!("{column} {} {}", cmp.as_sql(), params.push(value)),
            }
        })
        .collect();
    format!(" WHERE {}", conds.join(" AND "))
}

/// Builds an INSERT; `returning` asks for the stored row back where the
/// dialect can do that in one statement.
pub(crate) fn insert(dialect: Dialect, table: &str, fields: &Fields, returning: bool) -> Statement {
    let mut params = Params::new(dialect);
    let table = dialect.quote_ident(table);

    let mut sql = if fields.is_empty() {
        match dialect {
            Dialect::MySql => format!("INSERT INTO {table} () VALUES ()"),
            Dialect::Postgres | Dialect::Sqlite => format!("INSERT INTO {table} DEFAULT VALUES"),
        }
    } else {
        let cols: Vec<String> = fields.keys().map(|c| dialect.quote_ident(c)).collect();
        let values: Vec<String> = fields.iter().map(|(_, v)| params.push(v)).collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            cols.join(", "),
            values.join(", ")
        )
    };

    if returning && dialect.supports_returning() {
        sql.push_str(" RETURNING *");
    }
    params.finish(sql)
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Select {
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub(crate) fn select(dialect: Dialect, table: &str, query: &Select) -> Statement {
    let mut params = Params::new(dialect);

    let columns = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query
            .columns
            .iter()
            .map(|c| dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut sql = format!("SELECT {columns} FROM {}", dialect.quote_ident(table));
    sql.push_str(&where_clause(dialect, &query.filters, &mut params));

    if !query.order_by.is_empty() {
        let order: Vec<String> = query
            .order_by
            .iter()
            .map(|(c, dir)| format!("{} {dir}", dialect.quote_ident(c)))
            .collect();
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }

    match (query.limit, query.offset, dialect) {
        (Some(limit), _, _) => sql.push_str(&format!(" LIMIT {limit}")),
        // OFFSET needs a LIMIT on these two.
        (None, Some(_), Dialect::Sqlite) => sql.push_str(" LIMIT -1"),
        (None, Some(_), Dialect::MySql) => sql.push_str(&format!(" LIMIT {}", u64::MAX)),
        _ => {}
    }
    if let Some(offset) = query.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    params.finish(sql)
}

pub(crate) fn update(dialect: Dialect, table: &str, fields: &Fields, filters: &[Filter]) -> Statement {
    let mut params = Params::new(dialect);
    let sets: Vec<String> = fields
        .iter()
        .map(|(c, v)| format!("{} = {}", dialect.quote_ident(c), params.push(v)))
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_ident(table),
        sets.join(", ")
    );
    sql.push_str(&where_clause(dialect, filters, &mut params));
    params.finish(sql)
}

pub(crate) fn delete(dialect: Dialect, table: &str, filters: &[Filter]) -> Statement {
    let mut params = Params::new(dialect);
    let mut sql = format!("DELETE FROM {}", dialect.quote_ident(table));
    sql.push_str(&where_clause(dialect, filters, &mut params));
    params.finish(sql)
}
