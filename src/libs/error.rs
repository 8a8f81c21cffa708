use crate::engine::EngineError;
use crate::schema::FieldType;
use crate::value::ValueKind;
use thiserror::Error;

/// Every failure a model operation can report.
///
/// Application-schema rejections and physical-table rejections land in the
/// same enum, so callers match on one taxonomy whichever layer said no.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("query engine error: {0}")]
    Engine(String),
}

/// Raised by the schema validator before any database round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field `{field}` is missing")]
    MissingRequiredField { field: String },

    #[error("field `{field}` expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: ValueKind,
    },

    #[error("field `{field}` is not declared in the schema")]
    UnknownField { field: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingRequiredField { field }
            | ValidationError::TypeMismatch { field, .. }
            | ValidationError::UnknownField { field } => field,
        }
    }
}

/// Raised when the database itself rejects an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("unknown column on `{table}`: {message}")]
    UnknownColumn { table: String, message: String },

    #[error("database rejected operation on `{table}`: {message}")]
    DatabaseConstraint {
        table: String,
        code: Option<String>,
        message: String,
    },
}

impl ConstraintError {
    /// The message reported by the database driver.
    pub fn underlying_message(&self) -> &str {
        match self {
            ConstraintError::UnknownColumn { message, .. }
            | ConstraintError::DatabaseConstraint { message, .. } => message,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("timed out waiting for a database connection")]
    Timeout,

    #[error("database unavailable: {message}")]
    Unavailable { message: String },
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::Constraint(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Only connection failures are worth retrying; an invalid write stays
    /// invalid.
    pub fn is_retryable(&self) -> bool {
        self.is_connection()
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        ConnectionError::Unavailable {
            message: message.into(),
        }
        .into()
    }

    /// Reclassifies a query engine failure against `table`.
    pub(crate) fn from_engine(err: EngineError, table: &str) -> Self {
        match err {
            EngineError::Timeout => ConnectionError::Timeout.into(),
            EngineError::Unavailable(message) => Error::unavailable(message),
            EngineError::Database { code, message } => {
                if is_unknown_column(code.as_deref(), &message) {
                    ConstraintError::UnknownColumn {
                        table: table.to_string(),
                        message,
                    }
                    .into()
                } else {
                    ConstraintError::DatabaseConstraint {
                        table: table.to_string(),
                        code,
                        message,
                    }
                    .into()
                }
            }
            EngineError::Other(message) => Error::Engine(message),
        }
    }
}

/// PostgreSQL `undefined_column`.
const PG_UNDEFINED_COLUMN: &str = "42703";
/// MySQL `ER_BAD_FIELD_ERROR`.
const MYSQL_BAD_FIELD: &str = "1054";

fn is_unknown_column(code: Option<&str>, message: &str) -> bool {
    if matches!(code, Some(PG_UNDEFINED_COLUMN | MYSQL_BAD_FIELD)) {
        return true;
    }
    let message = message.to_lowercase();
    ["no such column", "has no column named", "unknown column"]
        .iter()
        .any(|needle| message.contains(needle))
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn db_error(code: Option<&str>, message: &str) -> EngineError {
        EngineError::Database {
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn classifies_unknown_columns_by_code() {
        let err = Error::from_engine(db_error(Some("42703"), "column \"title\" does not exist"), "test");
        assert!(matches!(
            err,
            Error::Constraint(ConstraintError::UnknownColumn { ref table, .. }) if table == "test"
        ));

        let err = Error::from_engine(db_error(Some("1054"), "Unknown column 'title'"), "test");
        assert!(matches!(err, Error::Constraint(ConstraintError::UnknownColumn { .. })));
    }

    #[test]
    fn classifies_sqlite_unknown_column_messages() {
        for message in ["no such column: title", "table test has no column named title"] {
            let err = Error::from_engine(db_error(Some("1"), message), "test");
            assert!(matches!(err, Error::Constraint(ConstraintError::UnknownColumn { .. })), "{message}");
        }
    }

    #[test]
    fn other_database_errors_are_constraints() {
        let err = Error::from_engine(
            db_error(Some("23502"), "null value in column \"age\" violates not-null constraint"),
            "test",
        );
        match err {
            Error::Constraint(ConstraintError::DatabaseConstraint { code, message, .. }) => {
                assert_eq!(code.as_deref(), Some("23502"));
                assert!(message.contains("not-null"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pool_failures_are_connection_errors() {
        let err = Error::from_engine(EngineError::Timeout, "test");
        assert!(matches!(err, Error::Connection(ConnectionError::Timeout)));
        assert!(err.is_retryable());

        let err = Error::from_engine(EngineError::Unavailable("pool closed".into()), "test");
        assert!(err.is_connection());
        assert!(!err.is_constraint());
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let err: Error = ValidationError::UnknownField { field: "title".into() }.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "field `title` is not declared in the schema");
    }
}
