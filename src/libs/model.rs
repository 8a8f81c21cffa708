use crate::document::Document;
use crate::engine::{EngineError, QueryEngine};
use crate::error::{Error, Result, ValidationError};
use crate::query_builder::QueryBuilder;
use crate::schema::Schema;
use crate::sql::{self, Filter, Select};
use crate::validator::{validate_insert, validate_update};
use crate::value::{Fields, Value};
use std::sync::Arc;
use uuid::Uuid;

/// How a model obtains primary keys for new rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStrategy {
    /// The database generates the key (serial/autoincrement columns).
    #[default]
    Database,
    /// A missing key is filled with a v4 UUID string before the insert.
    Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub schema: Option<Schema>,
    /// Defaults to `id`.
    pub primary_key: Option<String>,
    pub id_strategy: IdStrategy,
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn with_uuid_ids(mut self) -> Self {
        self.id_strategy = IdStrategy::Uuid;
        self
    }
}

impl From<Schema> for ModelOptions {
    fn from(schema: Schema) -> Self {
        Self::new().with_schema(schema)
    }
}

/// A table binding with an optional schema.
///
/// Writes are validated against the schema (when one is declared) before the
/// engine is touched; whatever the database then rejects comes back through
/// the same [`Error`] taxonomy. The table and schema are fixed for the life
/// of the model. Clones share the engine.
#[derive(Debug, Clone)]
pub struct Model {
    table: String,
    schema: Option<Arc<Schema>>,
    primary_key: String,
    id_strategy: IdStrategy,
    engine: Arc<dyn QueryEngine>,
}

impl Model {
    pub(crate) fn new(
        table: impl Into<String>,
        options: ModelOptions,
        engine: Arc<dyn QueryEngine>,
    ) -> Self {
        Self {
            table: table.into(),
            schema: options.schema.map(Arc::new),
            primary_key: options.primary_key.unwrap_or_else(|| "id".to_string()),
            id_strategy: options.id_strategy,
            engine,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `None` means the model is unchecked and the database alone decides.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    // -------- Insert a record --------
    pub async fn insert(&self, mut fields: Fields) -> Result<Document> {
        self.validate(&fields, validate_insert)?;

        if self.id_strategy == IdStrategy::Uuid && self.key_in(&fields).is_none() {
            fields.insert(self.primary_key.as_str(), Uuid::new_v4().to_string());
        }

        let dialect = self.engine.dialect();
        let stmt = sql::insert(dialect, &self.table, &fields, true);

        if dialect.supports_returning() {
            let rows = self.engine.fetch(stmt).await.map_err(|e| self.reject(e))?;
            return match rows.into_iter().next() {
                Some(row) => Ok(self.wrap(row)),
                None => Err(Error::Engine(format!(
                    "insert into `{}` returned no row",
                    self.table
                ))),
            };
        }

        let outcome = self.engine.execute(stmt).await.map_err(|e| self.reject(e))?;
        let id = match self.key_in(&fields) {
            Some(id) => id.clone(),
            None => outcome.last_insert_id.map(Value::Int).ok_or_else(|| {
                Error::Engine(format!("insert into `{}` reported no generated id", self.table))
            })?,
        };
        self.get(id).await?.ok_or_else(|| {
            Error::Engine(format!("inserted row in `{}` could not be re-fetched", self.table))
        })
    }

    // -------- Get by primary key --------
    /// A missing row is `Ok(None)`, not an error.
    pub async fn get(&self, id: impl Into<Value>) -> Result<Option<Document>> {
        let id = id.into();
        if id.is_null() {
            return Ok(None);
        }

        let query = Select {
            filters: vec![Filter::eq(self.primary_key.as_str(), id)],
            limit: Some(1),
            ..Default::default()
        };
        let stmt = sql::select(self.engine.dialect(), &self.table, &query);
        let rows = self.engine.fetch(stmt).await.map_err(|e| self.reject(e))?;
        Ok(rows.into_iter().next().map(|row| self.wrap(row)))
    }

    // -------- Get all records --------
    /// Reads the whole table in the order the database returns it.
    pub async fn get_all(&self) -> Result<Vec<Document>> {
        let stmt = sql::select(self.engine.dialect(), &self.table, &Select::default());
        let rows = self.engine.fetch(stmt).await.map_err(|e| self.reject(e))?;
        Ok(rows.into_iter().map(|row| self.wrap(row)).collect())
    }

    // -------- Update record --------
    /// Applies a partial update. Fields left out are not touched; an id that
    /// matches nothing, including a null id, is not an error.
    pub async fn raw_update(&self, id: impl Into<Value>, fields: Fields) -> Result<()> {
        self.validate(&fields, validate_update)?;
        let id = id.into();
        if fields.is_empty() || id.is_null() {
            return Ok(());
        }

        let filters = [Filter::eq(self.primary_key.as_str(), id)];
        let stmt = sql::update(self.engine.dialect(), &self.table, &fields, &filters);
        let outcome = self.engine.execute(stmt).await.map_err(|e| self.reject(e))?;
        if outcome.rows_affected == 0 {
            log::debug!("update on `{}` matched no row", self.table);
        }
        Ok(())
    }

    // -------- Delete record --------
    /// Removing a row that is already gone succeeds. A null id matches
    /// nothing.
    pub async fn raw_remove(&self, id: impl Into<Value>) -> Result<()> {
        let id = id.into();
        if id.is_null() {
            return Ok(());
        }

        let filters = [Filter::eq(self.primary_key.as_str(), id)];
        let stmt = sql::delete(self.engine.dialect(), &self.table, &filters);
        let outcome = self.engine.execute(stmt).await.map_err(|e| self.reject(e))?;
        if outcome.rows_affected == 0 {
            log::debug!("remove on `{}` matched no row", self.table);
        }
        Ok(())
    }

    /// Query builder bound to this table. Nothing issued through it is
    /// checked against the schema.
    pub fn raw_qry(&self) -> QueryBuilder {
        QueryBuilder::new(self.table.clone(), Arc::clone(&self.engine))
    }

    fn key_in<'a>(&self, fields: &'a Fields) -> Option<&'a Value> {
        fields.get(&self.primary_key).filter(|v| !v.is_null())
    }

    /// Runs `check` when a schema is declared. The primary key is allowed
    /// even if the schema leaves it out.
    fn validate(
        &self,
        fields: &Fields,
        check: fn(&Fields, &Schema) -> std::result::Result<(), ValidationError>,
    ) -> Result<()> {
        let Some(schema) = self.schema.as_deref() else {
            return Ok(());
        };

        let result = if !schema.contains(&self.primary_key) && fields.contains_key(&self.primary_key)
        {
            let mut candidate = fields.clone();
            candidate.remove(&self.primary_key);
            check(&candidate, schema)
        } else {
            check(fields, schema)
        };

        result.map_err(|e| {
            log::debug!("rejected write to `{}`: {e}", self.table);
            e.into()
        })
    }

    fn reject(&self, err: EngineError) -> Error {
        log::debug!("`{}` query failed: {err}", self.table);
        Error::from_engine(err, &self.table)
    }

    fn wrap(&self, mut row: Fields) -> Document {
        if let Some(schema) = self.schema.as_deref() {
            for (name, descriptor) in schema.iter() {
                if let Some(value) = row.get_mut(name) {
                    *value = descriptor.ty.coerce(std::mem::replace(value, Value::Null));
                }
            }
        }
        Document::from_row(&self.table, &self.primary_key, row)
    }
}
