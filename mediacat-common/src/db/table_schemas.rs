//! Table Schema Definitions
//!
//! Single source of truth for the catalog schema. Tables are listed in
//! dependency order: a table comes after every table its foreign keys
//! reference.
//!
//! # Usage
//!
//! ```rust,ignore
//! // Reconcile all catalog tables on startup
//! sync_catalog_schema(&pool).await?;
//! ```

use crate::db::mysql_schema::MySqlSchemaBackend;
use crate::db::schema_sync::{
    ColumnDefinition, ForeignKeyDefinition, ReconcileReport, SchemaError, SchemaSync,
    TableDefinition, UniqueKeyDefinition,
};
use sqlx::MySqlPool;
use tracing::info;

/// Constraint that makes media imports idempotent
pub const MEDIA_UNIQUE_KEY: &str = "unique_media";

/// Collation of natural-key columns: byte-exact, no case or accent folding
pub const NATURAL_KEY_COLLATION: &str = "utf8mb4_bin";

/// Users table schema
///
/// Only the key; ownership rows in `user_media` reference it.
pub fn users_table() -> TableDefinition {
    TableDefinition::new("users")
        .column(ColumnDefinition::new("id", "INT").primary_key().auto_increment())
}

/// Artists table schema
///
/// `name` is the natural key but carries no unique constraint.
pub fn artists_table() -> TableDefinition {
    TableDefinition::new("artists")
        .column(ColumnDefinition::new("id", "INT").primary_key().auto_increment())
        .column(ColumnDefinition::new("name", "TEXT").collate(NATURAL_KEY_COLLATION))
}

/// Formats table schema
pub fn formats_table() -> TableDefinition {
    TableDefinition::new("formats")
        .column(ColumnDefinition::new("id", "INT").primary_key().auto_increment())
        .column(ColumnDefinition::new("name", "TEXT").collate(NATURAL_KEY_COLLATION))
        .column(ColumnDefinition::new("description", "TEXT").collate(NATURAL_KEY_COLLATION))
}

/// Media table schema
///
/// `genre_tags` holds the comma-joined tag list.
/// TEXT columns need a prefix length inside a MySQL index. `title` is
/// byte-exact so `unique_media` never folds case.
pub fn media_table() -> TableDefinition {
    TableDefinition::new("media")
        .column(ColumnDefinition::new("id", "INT").primary_key().auto_increment())
        .column(ColumnDefinition::new("title", "TEXT").collate(NATURAL_KEY_COLLATION))
        .column(ColumnDefinition::new("date_published", "DATE"))
        .column(ColumnDefinition::new("image_url", "TEXT"))
        .column(ColumnDefinition::new("genre_tags", "TEXT"))
        .column(ColumnDefinition::new("artist_id", "INT"))
        .column(ColumnDefinition::new("format_id", "INT"))
        .foreign_key(ForeignKeyDefinition::new("fk_media_artist", "artist_id", "artists", "id"))
        .foreign_key(ForeignKeyDefinition::new("fk_media_format", "format_id", "formats", "id"))
        .unique_key(
            UniqueKeyDefinition::new(MEDIA_UNIQUE_KEY)
                .column_prefix("title", 255)
                .column("artist_id")
                .column("format_id"),
        )
}

/// User ownership join table schema
pub fn user_media_table() -> TableDefinition {
    TableDefinition::new("user_media")
        .column(ColumnDefinition::new("user_id", "INT").primary_key())
        .column(ColumnDefinition::new("media_id", "INT").primary_key())
        .column(ColumnDefinition::new("format_id", "INT").primary_key())
        .foreign_key(ForeignKeyDefinition::new("fk_user_media_user", "user_id", "users", "id"))
        .foreign_key(ForeignKeyDefinition::new("fk_user_media_media", "media_id", "media", "id"))
        .foreign_key(ForeignKeyDefinition::new("fk_user_media_format", "format_id", "formats", "id"))
}

/// Full catalog schema in dependency order
pub fn catalog_schema() -> Vec<TableDefinition> {
    vec![
        users_table(),
        artists_table(),
        formats_table(),
        media_table(),
        user_media_table(),
    ]
}

/// Synchronize the catalog schema against a database-scoped pool
pub async fn sync_catalog_schema(pool: &MySqlPool) -> Result<ReconcileReport, SchemaError> {
    info!("=== Catalog Schema Synchronization ===");

    let backend = MySqlSchemaBackend::new(pool.clone());
    let report = SchemaSync::reconcile(&backend, &catalog_schema()).await?;

    info!("=== Schema Synchronization Complete ===");
    Ok(report)
}
