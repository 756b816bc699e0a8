//! Dotted field-path resolution against a [`Schema`].

use thiserror::Error;

use super::schema::{FieldType, Schema};

/// Why a field path could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldPathError {
    #[error("Field '{field}' not found in {schema} for path '{path}'.")]
    UnknownField {
        field: String,
        schema: String,
        path: String,
    },

    #[error(
        "Field '{traversed}' of type '{type_name}' is not a nested schema, so cannot access nested field '{field}'."
    )]
    NotASchema {
        traversed: String,
        type_name: String,
        field: String,
    },

    #[error("Querying on union fields with multiple types is not supported for '{traversed}'")]
    AmbiguousUnion { traversed: String },
}

/// Resolve `path` (e.g. `address.city`) to the declared type of its last segment.
///
/// Intermediate segments must be nested schemas, possibly wrapped in an
/// optional. The returned type is exactly as declared, so it may itself be
/// optional, a union or a list.
pub fn resolve_field_path<'a>(root: &'a Schema, path: &str) -> Result<&'a FieldType, FieldPathError> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut schema = root;

    for (i, part) in parts.iter().enumerate() {
        let declared = schema.get(part).ok_or_else(|| FieldPathError::UnknownField {
            field: (*part).to_string(),
            schema: schema.name().to_string(),
            path: path.to_string(),
        })?;

        let Some(next) = parts.get(i + 1) else {
            return Ok(declared);
        };

        let traversed = parts[..=i].join(".");
        let concrete = declared
            .unwrap_optional()
            .ok_or_else(|| FieldPathError::AmbiguousUnion {
                traversed: traversed.clone(),
            })?;
        schema = match concrete {
            FieldType::Object(nested) => nested.as_ref(),
            other => {
                return Err(FieldPathError::NotASchema {
                    traversed,
                    type_name: other.to_string(),
                    field: (*next).to_string(),
                });
            }
        };
    }

    // `split` always yields at least one segment, so the loop returns.
    Err(FieldPathError::UnknownField {
        field: String::new(),
        schema: root.name().to_string(),
        path: path.to_string(),
    })
}
