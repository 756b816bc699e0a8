//! Per-partition store clients.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::info;

use super::store::{DocumentStore, StoreError};

/// Name used for the default partition.
pub const DEFAULT_DATABASE: &str = "(default)";

/// Opens a store client for one partition.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, database: &str) -> Result<Arc<dyn DocumentStore>, StoreError>;
}

type Slot = Arc<OnceCell<Arc<dyn DocumentStore>>>;

/// Lazily-created store clients, one per partition.
///
/// The first caller for a partition connects; concurrent callers wait for that
/// connection instead of opening their own. A failed connect leaves the slot
/// empty so the next caller retries.
pub struct ClientRegistry {
    connector: Arc<dyn StoreConnector>,
    clients: DashMap<Option<String>, Slot>,
}

impl ClientRegistry {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            clients: DashMap::new(),
        }
    }

    /// Store client for `database`, or the default partition when `None`.
    pub async fn client(&self, database: Option<&str>) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let key = database.map(str::to_string);
        // Clone the slot out so no shard lock is held across the await.
        let slot: Slot = self.clients.entry(key).or_default().clone();

        let store = slot
            .get_or_try_init(|| async {
                let name = database.unwrap_or(DEFAULT_DATABASE);
                let store = self.connector.connect(name).await?;
                info!(database = name, "Document store client created");
                Ok::<_, StoreError>(store)
            })
            .await?;
        Ok(Arc::clone(store))
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("partitions", &self.clients.len())
            .finish()
    }
}
