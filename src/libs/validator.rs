//! Application-level checks run before any write reaches the database.
//!
//! Both entry points are pure: they read the candidate fields and the schema
//! and return the first violation found. On insert, required fields are
//! checked first in schema order; then caller fields in the order they were
//! supplied.

use crate::error::ValidationError;
use crate::schema::Schema;
use crate::value::Fields;

/// Checks a full record about to be inserted.
pub fn validate_insert(fields: &Fields, schema: &Schema) -> Result<(), ValidationError> {
    for (name, descriptor) in schema.iter() {
        if !descriptor.required {
            continue;
        }
        match fields.get(name) {
            Some(value) if !value.is_null() => {}
            _ => {
                return Err(ValidationError::MissingRequiredField {
                    field: name.to_string(),
                });
            }
        }
    }

    check_supplied(fields, schema)
}

/// Checks a partial update. Required-ness is not enforced here; whether a
/// stored value may be cleared is left to the table's own constraints.
pub fn validate_update(fields: &Fields, schema: &Schema) -> Result<(), ValidationError> {
    check_supplied(fields, schema)
}

fn check_supplied(fields: &Fields, schema: &Schema) -> Result<(), ValidationError> {
    for (name, value) in fields.iter() {
        let Some(descriptor) = schema.get(name) else {
            return Err(ValidationError::UnknownField {
                field: name.to_string(),
            });
        };

        if !descriptor.ty.accepts(value) {
            return Err(ValidationError::TypeMismatch {
                field: name.to_string(),
                expected: descriptor.ty,
                actual: value.kind(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use crate::value::{Value, ValueKind};
    use pretty_assertions::assert_eq;

    fn person() -> Schema {
        Schema::new()
            .field("name", FieldType::String)
            .required("age", FieldType::Number)
    }

    #[test]
    fn insert_requires_declared_fields() {
        let err = validate_insert(&Fields::from([("name", "john")]), &person()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequiredField {
                field: "age".into()
            }
        );
    }

    #[test]
    fn insert_treats_null_as_missing() {
        let fields = Fields::new().with("name", "john").with("age", Value::Null);
        let err = validate_insert(&fields, &person()).unwrap_err();
        assert_eq!(err.field(), "age");
    }

    #[test]
    fn insert_accepts_complete_record() {
        let fields = Fields::new().with("name", "john").with("age", 19);
        validate_insert(&fields, &person()).unwrap();

        let fields = Fields::new().with("name", Value::Null).with("age", 19.5);
        validate_insert(&fields, &person()).unwrap();
    }

    #[test]
    fn insert_rejects_unknown_fields() {
        let fields = Fields::new().with("age", 19).with("title", "mr");
        assert_eq!(
            validate_insert(&fields, &person()).unwrap_err(),
            ValidationError::UnknownField {
                field: "title".into()
            }
        );
    }

    #[test]
    fn update_allows_omitting_required_fields() {
        validate_update(&Fields::from([("name", "master")]), &person()).unwrap();
        validate_update(&Fields::new(), &person()).unwrap();
    }

    #[test]
    fn update_rejects_wrong_primitive() {
        let err = validate_update(&Fields::from([("age", "23")]), &person()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                field: "age".into(),
                expected: FieldType::Number,
                actual: ValueKind::String,
            }
        );
    }

    #[test]
    fn update_leaves_clearing_required_field_to_database() {
        validate_update(&Fields::from([("age", Value::Null)]), &person()).unwrap();
    }

    #[test]
    fn reports_first_violation_in_caller_order() {
        let fields = Fields::new()
            .with("age", "old")
            .with("title", "mr");
        assert_eq!(validate_update(&fields, &person()).unwrap_err().field(), "age");
    }
}
