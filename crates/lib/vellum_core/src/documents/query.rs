//! Query validation and the fluent query builder.

use serde_json::Value;

use super::collection::Collection;
use super::error::DocumentError;
use super::model::Model;
use super::path::resolve_field_path;
use super::schema::{FieldType, FieldViolation, Schema};
use super::store::{Filter, FilterOp, OrderBy, Query};

/// Check a filter against `schema`, returning it with canonicalised values.
///
/// Membership operators need a list value whose items match the field type;
/// containment operators against a list field check the element type.
pub fn validate_filter(schema: &Schema, filter: Filter) -> Result<Filter, DocumentError> {
    let Filter { field, op, value } = filter;
    let fail = |reason: String, value: Value| DocumentError::InvalidFilter {
        field: field.clone(),
        op,
        value,
        reason,
    };

    let field_type = match resolve_field_path(schema, &field) {
        Ok(field_type) => field_type,
        Err(err) => return Err(fail(err.to_string(), value)),
    };

    if op.takes_list() && !value.is_array() {
        let reason = format!("Value for operator '{op}' on field '{field}' must be a list.");
        return Err(fail(reason, value));
    }

    let expected = match (op, field_type.list_element()) {
        (FilterOp::ArrayContainsAny, Some(element)) => FieldType::list(element.clone()),
        (FilterOp::In | FilterOp::NotIn | FilterOp::ArrayContainsAny, _) => {
            FieldType::list(field_type.clone())
        }
        (FilterOp::ArrayContains, Some(element)) => element.clone(),
        _ => field_type.clone(),
    };

    if let Err(violations) = expected.validate(&field, &value) {
        return Err(fail(describe(&violations), value));
    }

    let mut value = value;
    expected.canonicalize(&mut value);
    Ok(Filter { field, op, value })
}

/// Check an ordering spec (`field` or `-field`) against `schema`.
pub fn validate_order_by(schema: &Schema, spec: &str) -> Result<OrderBy, DocumentError> {
    let order = OrderBy::parse(spec);
    resolve_field_path(schema, &order.field).map_err(|err| DocumentError::InvalidOrdering {
        field: order.field.clone(),
        reason: err.to_string(),
    })?;
    Ok(order)
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fluent query over one typed collection.
///
/// Each step validates immediately, so a bad filter fails where it is written.
#[derive(Debug)]
pub struct QueryBuilder<'c, T: Model> {
    collection: &'c Collection<T>,
    query: Query,
}

impl<'c, T: Model> QueryBuilder<'c, T> {
    pub(crate) fn new(collection: &'c Collection<T>) -> Self {
        Self {
            collection,
            query: Query::default(),
        }
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        op: FilterOp,
        value: impl Into<Value>,
    ) -> Result<Self, DocumentError> {
        let filter = validate_filter(self.collection.schema(), Filter::new(field, op, value))?;
        self.query.filters.push(filter);
        Ok(self)
    }

    /// Order by `field`, or by `-field` for descending. Repeat for tie-breakers.
    pub fn order_by(mut self, spec: &str) -> Result<Self, DocumentError> {
        let order = validate_order_by(self.collection.schema(), spec)?;
        self.query.order_by.push(order);
        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// The store query built so far.
    pub fn as_query(&self) -> &Query {
        &self.query
    }

    pub async fn fetch(self) -> Result<Vec<T>, DocumentError> {
        self.collection.run(&self.query).await
    }
}
