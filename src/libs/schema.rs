use crate::value::{Value, ValueKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared primitive kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[serde(alias = "String", alias = "STRING")]
    String,
    #[serde(alias = "Number", alias = "NUMBER")]
    Number,
    #[serde(alias = "Boolean", alias = "BOOLEAN", alias = "bool")]
    Boolean,
    #[serde(alias = "Date", alias = "DATE")]
    Date,
    #[serde(alias = "Json", alias = "JSON")]
    Json,
}

impl FieldType {
    /// Whether a non-null value is of this declared kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value.kind()) {
            (_, ValueKind::Null) => true,
            (FieldType::Json, _) => true,
            (FieldType::String, ValueKind::String)
            | (FieldType::Number, ValueKind::Number)
            | (FieldType::Boolean, ValueKind::Boolean)
            | (FieldType::Date, ValueKind::Date) => true,
            _ => false,
        }
    }

    /// Narrows a decoded row value to this kind where the stored
    /// representation is unambiguous; otherwise returns it unchanged.
    pub(crate) fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (FieldType::Date, Value::String(text)) => match Value::parse_date(&text) {
                Some(date) => Value::Date(date),
                None => Value::String(text),
            },
            (FieldType::Json, Value::String(text)) => match serde_json::from_str(&text) {
                Ok(json) => Value::Json(json),
                Err(_) => Value::String(text),
            },
            (FieldType::Boolean, Value::Int(0)) => Value::Bool(false),
            (FieldType::Boolean, Value::Int(1)) => Value::Bool(true),
            (_, value) => value,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldDescriptor {
    pub fn new(ty: FieldType) -> Self {
        Self { ty, required: false }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Application-level field declarations for one model.
///
/// A schema is independent of the physical table: it may declare fields the
/// table lacks and omit columns the table has. Writes must satisfy both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: IndexMap<String, FieldDescriptor>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a schema from JSON such as
    /// `{"age": {"type": "number", "required": true}}`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Declares an optional field.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), FieldDescriptor::new(ty));
        self
    }

    /// Declares a field that must be present and non-null on insert.
    pub fn required(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields
            .insert(name.into(), FieldDescriptor::new(ty).required());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldDescriptor)> for Schema {
    fn from_iter<I: IntoIterator<Item = (K, FieldDescriptor)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_declarations_from_json() {
        let schema = Schema::from_json(
            r#"{"name": {"type": "String"}, "age": {"type": "number", "required": true}}"#,
        )
        .unwrap();

        assert_eq!(
            schema,
            Schema::new()
                .field("name", FieldType::String)
                .required("age", FieldType::Number)
        );
        assert_eq!(schema.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["name", "age"]);
    }

    #[test]
    fn rejects_unknown_type_names() {
        assert!(Schema::from_json(r#"{"x": {"type": "money"}}"#).is_err());
    }

    #[test]
    fn number_accepts_ints_and_floats() {
        assert!(FieldType::Number.accepts(&Value::Int(3)));
        assert!(FieldType::Number.accepts(&Value::Float(3.5)));
        assert!(!FieldType::Number.accepts(&Value::from("23")));
        assert!(FieldType::Number.accepts(&Value::Null));
    }

    #[test]
    fn coerces_stored_representations() {
        assert_eq!(FieldType::Boolean.coerce(Value::Int(1)), Value::Bool(true));
        assert_eq!(FieldType::Boolean.coerce(Value::Int(7)), Value::Int(7));
        assert!(matches!(
            FieldType::Date.coerce(Value::from("2024-01-02 03:04:05")),
            Value::Date(_)
        ));
        assert_eq!(
            FieldType::Json.coerce(Value::from(r#"{"a":1}"#)),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(FieldType::String.coerce(Value::Int(5)), Value::Int(5));
    }
}
