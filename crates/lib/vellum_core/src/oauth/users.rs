//! User document upsert after a successful exchange.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::info;

use crate::auth::Claims;
use crate::documents::schema::format_timestamp;
use crate::documents::{DocumentStore, StoreError};

/// Collection holding one document per provider subject.
pub const USERS_COLLECTION: &str = "users";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Create or update the user document keyed by `sub`.
///
/// `sub`, `email`, `name`, `last_login` and `additional_fields` are merged
/// into the existing document; null values are dropped. Fields already stored
/// and not named here are kept.
pub async fn upsert_user(
    store: &dyn DocumentStore,
    sub: &str,
    claims: &Claims,
    additional_fields: &Map<String, Value>,
) -> Result<UpsertOutcome, StoreError> {
    let mut fields = Map::new();
    fields.insert("sub".into(), Value::from(sub));
    for claim in ["email", "name"] {
        if let Some(value) = claims.get(claim) {
            fields.insert(claim.into(), value.clone());
        }
    }
    fields.insert("last_login".into(), Value::from(format_timestamp(&Utc::now())));
    fields.extend(additional_fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    fields.retain(|_, value| !value.is_null());

    let (mut data, outcome) = match store.get(USERS_COLLECTION, sub).await? {
        Some(existing) => (existing.data, UpsertOutcome::Updated),
        None => (Map::new(), UpsertOutcome::Created),
    };
    data.extend(fields);
    store.set(USERS_COLLECTION, sub, data).await?;

    match outcome {
        UpsertOutcome::Created => info!(sub = %sub, "Created new user"),
        UpsertOutcome::Updated => info!(sub = %sub, "Updated existing user"),
    }
    Ok(outcome)
}
