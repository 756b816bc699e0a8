//! Introspectable schema descriptors for document models.
//!
//! A [`Schema`] lists a model's declared fields and their [`FieldType`]s. It is
//! built once when the model is registered and is then used both to validate
//! whole documents (on save and on read) and to resolve query field paths.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 timestamp stored as a string.
    Timestamp,
    Null,
    /// Accepts any JSON value.
    Any,
    /// Homogeneous list of the element type.
    List(Box<FieldType>),
    /// Nested sub-schema.
    Object(Arc<Schema>),
    /// Value must match at least one variant. `Optional(T)` is `Union([T, Null])`.
    Union(Vec<FieldType>),
}

impl FieldType {
    /// `T | null`.
    pub fn optional(inner: FieldType) -> Self {
        FieldType::Union(vec![inner, FieldType::Null])
    }

    pub fn list(element: FieldType) -> Self {
        FieldType::List(Box::new(element))
    }

    pub fn object(schema: Schema) -> Self {
        FieldType::Object(Arc::new(schema))
    }

    /// Whether a missing value is acceptable for this type.
    pub fn is_nullable(&self) -> bool {
        match self {
            FieldType::Null | FieldType::Any => true,
            FieldType::Union(variants) => variants.iter().any(FieldType::is_nullable),
            _ => false,
        }
    }

    /// Strip an optional wrapper.
    ///
    /// Returns the type itself when it is not a union, the single non-null
    /// variant of an optional, and `None` for a union of several non-null
    /// types.
    pub fn unwrap_optional(&self) -> Option<&FieldType> {
        match self {
            FieldType::Union(variants) => {
                let mut concrete = variants.iter().filter(|v| **v != FieldType::Null);
                match (concrete.next(), concrete.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            }
            other => Some(other),
        }
    }

    /// Element type when this is (an optional of) a list.
    pub fn list_element(&self) -> Option<&FieldType> {
        match self.unwrap_optional()? {
            FieldType::List(element) => Some(element),
            _ => None,
        }
    }

    /// Check a value against this type, collecting every violation under `path`.
    pub fn check(&self, path: &str, value: &Value, violations: &mut Vec<FieldViolation>) {
        match (self, value) {
            (FieldType::Any, _) => {}
            (FieldType::String, Value::String(_)) => {}
            (FieldType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {}
            (FieldType::Float, Value::Number(_)) => {}
            (FieldType::Boolean, Value::Bool(_)) => {}
            (FieldType::Null, Value::Null) => {}
            (FieldType::Timestamp, Value::String(s)) if parse_timestamp(s).is_some() => {}
            (FieldType::List(element), Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    element.check(&format!("{path}.{index}"), item, violations);
                }
            }
            (FieldType::Object(schema), Value::Object(map)) => {
                schema.check_fields(Some(path), map, violations);
            }
            (FieldType::Union(variants), _) => {
                let matches = variants.iter().any(|variant| {
                    let mut scratch = Vec::new();
                    variant.check(path, value, &mut scratch);
                    scratch.is_empty()
                });
                if !matches {
                    violations.push(FieldViolation::mismatch(path, self, value));
                }
            }
            _ => violations.push(FieldViolation::mismatch(path, self, value)),
        }
    }

    /// Validate a single value, returning the violations.
    pub fn validate(&self, path: &str, value: &Value) -> Result<(), Vec<FieldViolation>> {
        let mut violations = Vec::new();
        self.check(path, value, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl FieldType {
    /// Rewrite timestamps inside `value` into their stored form.
    ///
    /// Applied to every saved document and every filter value, so both sides
    /// of a comparison share one format. A union follows the first variant the
    /// value satisfies.
    pub fn canonicalize(&self, value: &mut Value) {
        match (self, value) {
            (FieldType::Timestamp, Value::String(raw)) => {
                if let Some(dt) = parse_timestamp(raw) {
                    *raw = format_timestamp(&dt);
                }
            }
            (FieldType::List(element), Value::Array(items)) => {
                for item in items {
                    element.canonicalize(item);
                }
            }
            (FieldType::Object(schema), Value::Object(map)) => schema.canonicalize(map),
            (FieldType::Union(variants), value) => {
                if let Some(variant) = variants.iter().find(|v| v.validate("", &*value).is_ok()) {
                    variant.canonicalize(value);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Float => f.write_str("float"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Timestamp => f.write_str("timestamp"),
            FieldType::Null => f.write_str("null"),
            FieldType::Any => f.write_str("any"),
            FieldType::List(element) => write!(f, "list[{element}]"),
            FieldType::Object(schema) => f.write_str(schema.name()),
            FieldType::Union(variants) => {
                for (i, variant) in variants.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{variant}")?;
                }
                Ok(())
            }
        }
    }
}

/// Named, ordered set of declared fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    fields: Vec<(String, FieldType)>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field. A later declaration with the same name replaces the earlier one.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = field_type,
            None => self.fields.push((name, field_type)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, field_type)| field_type)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    /// Validate a document body. Undeclared fields are ignored.
    pub fn validate(&self, data: &Map<String, Value>) -> Result<(), Vec<FieldViolation>> {
        let mut violations = Vec::new();
        self.check_fields(None, data, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Rewrite declared timestamp fields, at any depth, into their stored form.
    pub fn canonicalize(&self, data: &mut Map<String, Value>) {
        for (name, field_type) in &self.fields {
            if let Some(value) = data.get_mut(name) {
                field_type.canonicalize(value);
            }
        }
    }

    fn check_fields(
        &self,
        prefix: Option<&str>,
        data: &Map<String, Value>,
        violations: &mut Vec<FieldViolation>,
    ) {
        for (name, field_type) in &self.fields {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{name}"),
                None => name.clone(),
            };
            match data.get(name) {
                Some(value) => field_type.check(&path, value, violations),
                None if field_type.is_nullable() => {}
                None => violations.push(FieldViolation::missing(path)),
            }
        }
    }
}

/// One failing field in a document or filter value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
    /// Value that was received; `None` when the field was absent.
    pub received: Option<Value>,
}

impl FieldViolation {
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: "Field required".to_string(),
            received: None,
        }
    }

    pub fn mismatch(field: impl Into<String>, expected: &FieldType, received: &Value) -> Self {
        Self {
            field: field.into(),
            message: format!("Input should be a valid {expected}"),
            received: Some(received.clone()),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.received {
            Some(value) => write!(
                f,
                "Field `{}`: {}. Received: {}",
                self.field, self.message, value
            ),
            None => write!(f, "Field `{}`: {}. Received: <missing>", self.field, self.message),
        }
    }
}

/// Parse an RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical stored form of a timestamp (UTC, microsecond precision, `Z`).
///
/// A fixed width keeps stored timestamps ordered lexicographically.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serde adapter storing `DateTime<Utc>` in the canonical timestamp format.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    /// Same as the parent module for `Option<DateTime<Utc>>`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&super::super::format_timestamp(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    super::super::parse_timestamp(&raw)
                        .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address() -> Schema {
        Schema::new("Address")
            .field("city", FieldType::String)
            .field("zip", FieldType::optional(FieldType::String))
    }

    fn person() -> Schema {
        Schema::new("Person")
            .field("name", FieldType::String)
            .field("age", FieldType::Integer)
            .field("tags", FieldType::list(FieldType::String))
            .field("address", FieldType::object(address()))
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn valid_document_passes() {
        let data = as_map(json!({
            "name": "Ada",
            "age": 36,
            "tags": ["math"],
            "address": {"city": "London"},
            "unknown": true
        }));
        assert!(person().validate(&data).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let data = as_map(json!({
            "name": 7,
            "tags": ["ok", 3],
            "address": {"zip": "N1"}
        }));
        let violations = person().validate(&data).unwrap_err();
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "age", "tags.1", "address.city"]);
        assert_eq!(violations[0].received, Some(json!(7)));
        assert_eq!(violations[1].received, None);
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        assert!(FieldType::Integer.validate("n", &json!(1.5)).is_err());
        assert!(FieldType::Float.validate("n", &json!(1)).is_ok());
    }

    #[test]
    fn timestamp_requires_rfc3339() {
        assert!(FieldType::Timestamp.validate("t", &json!("2024-05-01T10:00:00Z")).is_ok());
        assert!(FieldType::Timestamp.validate("t", &json!("yesterday")).is_err());
    }

    #[test]
    fn unwrap_optional_handles_unions() {
        let optional = FieldType::optional(FieldType::Integer);
        assert_eq!(optional.unwrap_optional(), Some(&FieldType::Integer));

        let ambiguous = FieldType::Union(vec![FieldType::Integer, FieldType::String]);
        assert_eq!(ambiguous.unwrap_optional(), None);

        assert_eq!(FieldType::Boolean.unwrap_optional(), Some(&FieldType::Boolean));
    }

    #[test]
    fn violation_display_includes_received_value() {
        let v = FieldViolation::mismatch("age", &FieldType::Integer, &json!("old"));
        assert_eq!(
            v.to_string(),
            "Field `age`: Input should be a valid integer. Received: \"old\""
        );
    }

    #[test]
    fn canonical_timestamps_sort_lexicographically() {
        let early = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        let late = parse_timestamp("2024-05-01T10:00:00.5Z").unwrap();
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn canonicalize_reaches_nested_and_listed_timestamps() {
        let visit = Schema::new("Visit").field("at", FieldType::Timestamp);
        let schema = Schema::new("Trip")
            .field("start", FieldType::optional(FieldType::Timestamp))
            .field("stops", FieldType::list(FieldType::object(visit)))
            .field("label", FieldType::String);
        let mut data = as_map(json!({
            "start": "2024-05-01T12:00:00+02:00",
            "stops": [{"at": "2024-05-01T10:30:00Z"}],
            "label": "2024-05-01T10:00:00Z"
        }));

        schema.canonicalize(&mut data);

        assert_eq!(data["start"], json!("2024-05-01T10:00:00.000000Z"));
        assert_eq!(data["stops"][0]["at"], json!("2024-05-01T10:30:00.000000Z"));
        assert_eq!(data["label"], json!("2024-05-01T10:00:00Z"));
    }
}
