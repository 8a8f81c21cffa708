use crate::error::{Error, Result};
use crate::value::{Fields, Value};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::ops::Index;

/// A read-only record handed back by a [`Model`](crate::Model).
///
/// Only model operations construct documents. To observe a change, fetch a
/// fresh document; all writes go back through the model by id.
#[derive(Debug, Clone)]
pub struct Document {
    table: String,
    id: Value,
    fields: Fields,
}

impl Document {
    pub(crate) fn from_row(table: &str, primary_key: &str, fields: Fields) -> Self {
        let id = fields.get(primary_key).cloned().unwrap_or(Value::Null);
        Self {
            table: table.to_string(),
            id,
            fields,
        }
    }

    /// The table this document was read from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The primary key, if the row carries a non-null one.
    pub fn id(&self) -> Option<&Value> {
        (!self.id.is_null()).then_some(&self.id)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Whether both documents stand for the same stored row.
    pub fn is_same_record(&self, other: &Document) -> bool {
        self.table == other.table && !self.id.is_null() && self.id == other.id
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.fields.to_json()
    }

    /// Deserializes the document into a caller-defined struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| Error::Engine(format!("cannot decode `{}` document: {e}", self.table)))
    }
}

impl Index<&str> for Document {
    type Output = Value;

    /// Missing fields index to `Value::Null`.
    fn index(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    fn doc(table: &str, id: impl Into<Value>, name: &str) -> Document {
        Document::from_row(
            table,
            "id",
            Fields::new().with("id", id).with("name", name).with("age", Value::Null),
        )
    }

    #[test]
    fn exposes_identity_and_fields() {
        let d = doc("test", 4, "john");
        assert_eq!(d.id(), Some(&Value::Int(4)));
        assert_eq!(d["name"], Value::from("john"));
        assert_eq!(d["missing"], Value::Null);
        assert_eq!(d.get("missing"), None);
    }

    #[test]
    fn null_ids_never_match() {
        let a = doc("test", Value::Null, "john");
        let b = doc("test", Value::Null, "john");
        assert_eq!(a.id(), None);
        assert!(!a.is_same_record(&b));
    }

    #[test]
    fn identity_is_per_table() {
        assert!(doc("test", 1, "john").is_same_record(&doc("test", 1, "mark")));
        assert!(!doc("test", 1, "john").is_same_record(&doc("other", 1, "john")));
        assert!(!doc("test", 1, "john").is_same_record(&doc("test", 2, "john")));
    }

    #[test]
    fn decodes_into_structs() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Person {
            id: i64,
            name: String,
            age: Option<i32>,
        }

        let person: Person = doc("test", 9, "david").decode().unwrap();
        assert_eq!(
            person,
            Person {
                id: 9,
                name: "david".into(),
                age: None
            }
        );
    }
}
