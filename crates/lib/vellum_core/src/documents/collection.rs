//! Typed CRUD over one registered collection.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::error::{DocumentError, ModelValidationError};
use super::model::{Model, ModelDescriptor, now};
use super::query::{QueryBuilder, validate_filter, validate_order_by};
use super::schema::{FieldViolation, Schema, format_timestamp};
use super::store::{Document, DocumentStore, Filter, Query};

/// Handle on the collection of model `T`. Obtained from
/// [`Documents::collection`](super::Documents::collection).
pub struct Collection<T: Model> {
    store: Arc<dyn DocumentStore>,
    descriptor: Arc<ModelDescriptor>,
    _model: PhantomData<fn() -> T>,
}

impl<T: Model> Collection<T> {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, descriptor: Arc<ModelDescriptor>) -> Self {
        Self {
            store,
            descriptor,
            _model: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.collection
    }

    pub fn schema(&self) -> &Schema {
        &self.descriptor.schema
    }

    /// Validate and write `record`, overwriting any stored document with its id.
    ///
    /// `updated_at` is stamped with the current time, never earlier than
    /// `created_at`. The record is only touched once the write succeeds.
    /// Timestamp fields are stored in canonical form.
    pub async fn save(&self, record: &mut T) -> Result<(), DocumentError> {
        let meta = record.metadata();
        let updated_at = now().max(meta.created_at);
        let id = meta.id.clone();

        let mut data = match serde_json::to_value(&*record) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(DocumentError::Encode {
                    model: self.descriptor.model.clone(),
                    reason: format!("expected an object, got {other}"),
                });
            }
            Err(err) => {
                return Err(DocumentError::Encode {
                    model: self.descriptor.model.clone(),
                    reason: err.to_string(),
                });
            }
        };
        data.remove("id");
        data.insert(
            "updated_at".to_string(),
            Value::String(format_timestamp(&updated_at)),
        );

        self.check(&id, &data)?;
        self.schema().canonicalize(&mut data);
        self.store.set(self.name(), &id, data).await?;
        record.metadata_mut().updated_at = updated_at;
        debug!(model = %self.descriptor.model, id = %id, "Saved document");
        Ok(())
    }

    /// Fetch by id. A stored document that no longer matches the schema is an error.
    pub async fn get(&self, id: &str) -> Result<Option<T>, DocumentError> {
        match self.store.get(self.name(), id).await? {
            Some(document) => self.hydrate(document).map(Some),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), DocumentError> {
        self.store.delete(self.name(), id).await?;
        debug!(model = %self.descriptor.model, id = %id, "Deleted document");
        Ok(())
    }

    pub fn query(&self) -> QueryBuilder<'_, T> {
        QueryBuilder::new(self)
    }

    /// Filtered, ordered, paginated fetch in one call.
    pub async fn find(
        &self,
        filters: impl IntoIterator<Item = Filter>,
        order_by: &[&str],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<T>, DocumentError> {
        let schema = self.schema();
        let query = Query {
            filters: filters
                .into_iter()
                .map(|filter| validate_filter(schema, filter))
                .collect::<Result<_, _>>()?,
            order_by: order_by
                .iter()
                .map(|spec| validate_order_by(schema, spec))
                .collect::<Result<_, _>>()?,
            limit,
            offset,
        };
        self.run(&query).await
    }

    pub(crate) async fn run(&self, query: &Query) -> Result<Vec<T>, DocumentError> {
        self.store
            .query(self.name(), query)
            .await?
            .into_iter()
            .map(|document| self.hydrate(document))
            .collect()
    }

    fn hydrate(&self, document: Document) -> Result<T, DocumentError> {
        let Document { id, mut data } = document;
        self.check(&id, &data)?;
        data.insert("id".to_string(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(|err| {
            self.validation_error(&id, vec![FieldViolation {
                field: "(document)".to_string(),
                message: err.to_string(),
                received: None,
            }])
            .into()
        })
    }

    fn check(&self, id: &str, data: &Map<String, Value>) -> Result<(), ModelValidationError> {
        self.schema()
            .validate(data)
            .map_err(|violations| self.validation_error(id, violations))
    }

    fn validation_error(&self, id: &str, violations: Vec<FieldViolation>) -> ModelValidationError {
        ModelValidationError {
            model: self.descriptor.model.clone(),
            doc_id: id.to_string(),
            collection: self.descriptor.collection.clone(),
            violations,
        }
    }
}

impl<T: Model> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.descriptor.model)
            .field("collection", &self.descriptor.collection)
            .finish()
    }
}
