//! Typed models and their startup registration.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::collection::Collection;
use super::error::{DocumentError, RegistrationError};
use super::registry::{ClientRegistry, StoreConnector};
use super::schema::{FieldType, Schema, timestamp};
use crate::id::new_document_id;

/// Identifier and timestamps shared by every model.
///
/// Models embed it with `#[serde(flatten)]`. The identifier is the document
/// key and is stripped from the stored body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default = "new_document_id")]
    pub id: String,
    #[serde(with = "timestamp", default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp", default = "now")]
    pub updated_at: DateTime<Utc>,
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl Metadata {
    pub fn new() -> Self {
        let at = now();
        Self {
            id: new_document_id(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new()
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A record type persisted through [`Collection`].
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;

    fn id(&self) -> &str {
        &self.metadata().id
    }
}

/// Where and how a model is stored.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Name used in error messages.
    pub model: String,
    pub collection: String,
    /// Database partition; `None` selects the default one.
    pub database: Option<String>,
    pub schema: Schema,
}

impl ModelDescriptor {
    pub fn new(model: impl Into<String>, collection: impl Into<String>, schema: Schema) -> Self {
        Self {
            model: model.into(),
            collection: collection.into(),
            database: None,
            schema,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Registered models plus the store clients they use.
pub struct Documents {
    clients: ClientRegistry,
    models: HashMap<TypeId, Arc<ModelDescriptor>>,
}

impl Documents {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            clients: ClientRegistry::new(connector),
            models: HashMap::new(),
        }
    }

    /// Register `T` once at startup.
    ///
    /// `created_at` and `updated_at` are added to the schema as timestamps.
    pub fn register<T: Model>(&mut self, descriptor: ModelDescriptor) -> Result<(), RegistrationError> {
        let ModelDescriptor {
            model,
            collection,
            database,
            schema,
        } = descriptor;

        if collection.is_empty() {
            return Err(RegistrationError::EmptyCollection { model });
        }
        if collection.contains('/') {
            return Err(RegistrationError::InvalidCollection { model, collection });
        }
        if schema.contains("id") {
            return Err(RegistrationError::ReservedField {
                model,
                field: "id".to_string(),
            });
        }
        if self.models.contains_key(&TypeId::of::<T>()) {
            return Err(RegistrationError::Duplicate(model));
        }

        let schema = schema
            .field("created_at", FieldType::Timestamp)
            .field("updated_at", FieldType::Timestamp);
        tracing::debug!(model = %model, collection = %collection, "Registered document model");
        self.models.insert(
            TypeId::of::<T>(),
            Arc::new(ModelDescriptor {
                model,
                collection,
                database,
                schema,
            }),
        );
        Ok(())
    }

    pub fn descriptor<T: Model>(&self) -> Option<&ModelDescriptor> {
        self.models.get(&TypeId::of::<T>()).map(AsRef::as_ref)
    }

    /// Typed handle on `T`'s collection, connecting its partition on first use.
    pub async fn collection<T: Model>(&self) -> Result<Collection<T>, DocumentError> {
        let descriptor = self
            .models
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or(DocumentError::Unregistered(type_name::<T>()))?;
        let store = self.clients.client(descriptor.database.as_deref()).await?;
        Ok(Collection::new(store, descriptor))
    }
}

impl std::fmt::Debug for Documents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Documents")
            .field("clients", &self.clients)
            .field("models", &self.models.len())
            .finish()
    }
}
