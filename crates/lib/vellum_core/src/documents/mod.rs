//! Typed document models over a pluggable document store.
//!
//! Models are registered once at startup with [`Documents::register`]. Each
//! registration names a collection, an optional database partition and the
//! model's [`Schema`]. Every write and every read is checked against that
//! schema, and query filters are checked against the declared type of the
//! field they target before they reach the store.

pub mod collection;
pub mod error;
pub mod memory;
pub mod model;
pub mod path;
pub mod postgres;
pub mod query;
pub mod registry;
pub mod schema;
pub mod store;

pub use collection::Collection;
pub use error::{DocumentError, ModelValidationError, RegistrationError};
pub use memory::{MemoryConnector, MemoryStore};
pub use model::{Documents, Metadata, Model, ModelDescriptor};
pub use path::{FieldPathError, resolve_field_path};
pub use postgres::{PgConnector, PgDocumentStore};
pub use query::QueryBuilder;
pub use registry::{ClientRegistry, DEFAULT_DATABASE, StoreConnector};
pub use schema::{FieldType, FieldViolation, Schema};
pub use store::{Direction, Document, DocumentStore, Filter, FilterOp, OrderBy, Query, StoreError};
