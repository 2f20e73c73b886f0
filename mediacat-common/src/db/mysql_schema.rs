//! MySQL schema backend
//!
//! Probes `information_schema` scoped to the connection's current database
//! (`DATABASE()`) and renders [`SchemaChange`] values into MySQL DDL.
//! Identifiers reaching this module have already passed
//! [`SchemaDiff::validate`](crate::db::schema_sync::SchemaDiff::validate).

use crate::db::schema_sync::{ColumnDefinition, SchemaBackend, SchemaChange};
use crate::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::debug;

/// [`SchemaBackend`] over a database-scoped MySQL pool
#[derive(Clone)]
pub struct MySqlSchemaBackend {
    pool: MySqlPool,
}

impl MySqlSchemaBackend {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaBackend for MySqlSchemaBackend {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            "#,
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn column_type(&self, table: &str, column: &str) -> Result<Option<String>> {
        let column_type: Option<String> = sqlx::query_scalar(
            r#"
            SELECT CAST(COLUMN_TYPE AS CHAR) FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?
            "#,
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await?;

        debug!("  Probe {}.{}: {:?}", table, column, column_type);
        Ok(column_type)
    }

    async fn constraint_exists(&self, table: &str, constraint: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM information_schema.TABLE_CONSTRAINTS
            WHERE CONSTRAINT_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = ?
            "#,
        )
        .bind(table)
        .bind(constraint)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn apply(&self, change: &SchemaChange) -> Result<()> {
        let sql = render_ddl(change);
        debug!("  DDL: {}", sql);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}

/// Backtick-quote a validated identifier so reserved words stay usable
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name)
}

fn quote_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().map(quote_identifier).collect::<Vec<_>>().join(", ")
}

/// Render one change as a MySQL statement
pub fn render_ddl(change: &SchemaChange) -> String {
    match change {
        SchemaChange::CreateTable { table, key_columns } => {
            let columns: Vec<String> = key_columns.iter().map(render_key_column).collect();
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
                quote_identifier(table),
                columns.join(", "),
                quote_list(key_columns.iter().map(|c| c.name.as_str()))
            )
        }
        SchemaChange::AddColumn { table, column } => format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table),
            render_added_column(column)
        ),
        SchemaChange::AddForeignKey { table, foreign_key } => format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_identifier(table),
            quote_identifier(&foreign_key.name),
            quote_identifier(&foreign_key.column),
            quote_identifier(&foreign_key.references_table),
            quote_identifier(&foreign_key.references_column)
        ),
        SchemaChange::AddUniqueKey { table, unique_key } => {
            let parts: Vec<String> = unique_key
                .parts
                .iter()
                .map(|p| match p.prefix {
                    Some(len) => format!("{}({})", quote_identifier(&p.column), len),
                    None => quote_identifier(&p.column),
                })
                .collect();
            format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                quote_identifier(table),
                quote_identifier(&unique_key.name),
                parts.join(", ")
            )
        }
    }
}

fn render_key_column(column: &ColumnDefinition) -> String {
    let mut sql = format!("{} {} NOT NULL", quote_identifier(&column.name), column.sql_type);
    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    sql
}

// ALTER TABLE ADD COLUMN on a populated table:
// - NOT NULL only with a DEFAULT, otherwise the column stays nullable
// - PRIMARY KEY / AUTO_INCREMENT never added after creation
fn render_added_column(column: &ColumnDefinition) -> String {
    let mut sql = format!("{} {}", quote_identifier(&column.name), column.sql_type);

    if let Some(collation) = &column.collation {
        sql.push_str(&format!(" COLLATE {}", collation));
    }

    match (&column.default_value, column.not_null) {
        (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
        (Some(default), false) => sql.push_str(&format!(" NULL DEFAULT {}", default)),
        (None, _) => sql.push_str(" NULL"),
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema_sync::{ForeignKeyDefinition, UniqueKeyDefinition};

    #[test]
    fn test_render_create_table() {
        let change = SchemaChange::CreateTable {
            table: "artists".to_string(),
            key_columns: vec![ColumnDefinition::new("id", "INT").primary_key().auto_increment()],
        };
        assert_eq!(
            render_ddl(&change),
            "CREATE TABLE IF NOT EXISTS `artists` (`id` INT NOT NULL AUTO_INCREMENT, PRIMARY KEY (`id`))"
        );
    }

    #[test]
    fn test_render_create_table_composite_key() {
        let change = SchemaChange::CreateTable {
            table: "user_media".to_string(),
            key_columns: vec![
                ColumnDefinition::new("user_id", "INT").primary_key(),
                ColumnDefinition::new("media_id", "INT").primary_key(),
            ],
        };
        assert_eq!(
            render_ddl(&change),
            "CREATE TABLE IF NOT EXISTS `user_media` (`user_id` INT NOT NULL, `media_id` INT NOT NULL, \
             PRIMARY KEY (`user_id`, `media_id`))"
        );
    }

    #[test]
    fn test_render_add_column() {
        let change = SchemaChange::AddColumn {
            table: "media".to_string(),
            column: ColumnDefinition::new("genre_tags", "TEXT"),
        };
        assert_eq!(render_ddl(&change), "ALTER TABLE `media` ADD COLUMN `genre_tags` TEXT NULL");
    }

    #[test]
    fn test_render_add_column_not_null_without_default_stays_nullable() {
        let change = SchemaChange::AddColumn {
            table: "media".to_string(),
            column: ColumnDefinition::new("title", "TEXT").not_null(),
        };
        assert_eq!(render_ddl(&change), "ALTER TABLE `media` ADD COLUMN `title` TEXT NULL");
    }

    #[test]
    fn test_render_add_column_with_default() {
        let change = SchemaChange::AddColumn {
            table: "user_media".to_string(),
            column: ColumnDefinition::new("quantity", "INT").not_null().default("1"),
        };
        assert_eq!(
            render_ddl(&change),
            "ALTER TABLE `user_media` ADD COLUMN `quantity` INT NOT NULL DEFAULT 1"
        );
    }

    #[test]
    fn test_render_foreign_key() {
        let change = SchemaChange::AddForeignKey {
            table: "media".to_string(),
            foreign_key: ForeignKeyDefinition::new("fk_media_artist", "artist_id", "artists", "id"),
        };
        assert_eq!(
            render_ddl(&change),
            "ALTER TABLE `media` ADD CONSTRAINT `fk_media_artist` FOREIGN KEY (`artist_id`) REFERENCES `artists` (`id`)"
        );
    }

    #[test]
    fn test_render_unique_key_with_prefix() {
        let change = SchemaChange::AddUniqueKey {
            table: "media".to_string(),
            unique_key: UniqueKeyDefinition::new("unique_media")
                .column_prefix("title", 255)
                .column("artist_id")
                .column("format_id"),
        };
        assert_eq!(
            render_ddl(&change),
            "ALTER TABLE `media` ADD CONSTRAINT `unique_media` UNIQUE (`title`(255), `artist_id`, `format_id`)"
        );
    }

    #[test]
    fn test_render_add_column_with_collation() {
        let change = SchemaChange::AddColumn {
            table: "artists".to_string(),
            column: ColumnDefinition::new("name", "TEXT").collate("utf8mb4_bin"),
        };
        assert_eq!(
            render_ddl(&change),
            "ALTER TABLE `artists` ADD COLUMN `name` TEXT COLLATE utf8mb4_bin NULL"
        );
    }

    #[test]
    fn test_reserved_word_identifiers_are_quoted() {
        let create = SchemaChange::CreateTable {
            table: "order".to_string(),
            key_columns: vec![ColumnDefinition::new("key", "INT").primary_key()],
        };
        assert_eq!(
            render_ddl(&create),
            "CREATE TABLE IF NOT EXISTS `order` (`key` INT NOT NULL, PRIMARY KEY (`key`))"
        );

        let add = SchemaChange::AddColumn {
            table: "order".to_string(),
            column: ColumnDefinition::new("select", "TEXT"),
        };
        assert_eq!(render_ddl(&add), "ALTER TABLE `order` ADD COLUMN `select` TEXT NULL");
    }
}
