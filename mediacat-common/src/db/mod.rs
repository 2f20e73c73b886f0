//! Database access: connections, schema reconciliation and catalog rows

pub mod catalog_store;
pub mod connection;
pub mod identifier;
pub mod models;
pub mod mysql_schema;
pub mod mysql_store;
pub mod resolver;
pub mod schema_sync;
pub mod table_schemas;

pub use catalog_store::CatalogStore;
pub use models::*;
pub use resolver::NaturalKeyResolver;
pub use schema_sync::{ReconcileReport, SchemaError, SchemaSync};
