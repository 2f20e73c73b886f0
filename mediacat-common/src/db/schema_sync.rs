//! Automatic Schema Synchronization
//!
//! Data-driven, additive-only schema reconciliation. Table definitions in code
//! are the single source of truth; on startup the live catalog metadata is
//! inspected and only the missing pieces are created.
//!
//! # Architecture
//!
//! Four phases, each completed for every table before the next starts:
//! 1. **Tables** - create missing tables with only their primary key
//! 2. **Columns** - add missing columns via ALTER TABLE ADD COLUMN
//! 3. **Constraints** - add missing foreign keys, then unique keys
//! 4. **Verify** - every declared constraint must now exist
//!
//! Columns are never dropped or retyped. A column whose live type differs from
//! the declared type is reported as drift and left alone.
//!
//! The probes and DDL go through [`SchemaBackend`], so the reconciler runs the
//! same against MySQL ([`crate::db::mysql_schema::MySqlSchemaBackend`]) and the
//! in-memory backend used by tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! let backend = MySqlSchemaBackend::new(pool.clone());
//! let report = SchemaSync::reconcile(&backend, &catalog_schema()).await?;
//! assert!(report.is_converged() || !report.applied.is_empty());
//! ```

use crate::db::identifier::{is_valid_default, is_valid_identifier, is_valid_sql_type};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INT", "DATE")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// Part of the PRIMARY KEY
    pub primary_key: bool,
    /// AUTO_INCREMENT (only meaningful on a key column)
    pub auto_increment: bool,
    /// DEFAULT value
    pub default_value: Option<String>,
    /// COLLATE clause for text columns
    pub collation: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            auto_increment: false,
            default_value: None,
            collation: None,
        }
    }

    /// Mark column as part of the PRIMARY KEY (implies NOT NULL)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Mark column as AUTO_INCREMENT
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Set the column collation
    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

/// Named foreign key from one local column to a column of another table
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDefinition {
    /// Constraint name
    pub name: String,
    /// Referencing column on the owning table
    pub column: String,
    /// Referenced table
    pub references_table: String,
    /// Referenced column
    pub references_column: String,
}

impl ForeignKeyDefinition {
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
        }
    }
}

/// One part of a unique key; `prefix` is required by MySQL for TEXT columns
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPart {
    pub column: String,
    pub prefix: Option<u16>,
}

/// Named unique key over one or more columns
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueKeyDefinition {
    pub name: String,
    pub parts: Vec<KeyPart>,
}

impl UniqueKeyDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
        }
    }

    /// Add a full-column key part
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.parts.push(KeyPart {
            column: column.into(),
            prefix: None,
        });
        self
    }

    /// Add a prefix key part (`column(length)`)
    pub fn column_prefix(mut self, column: impl Into<String>, length: u16) -> Self {
        self.parts.push(KeyPart {
            column: column.into(),
            prefix: Some(length),
        });
        self
    }
}

/// Desired state of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    /// Columns in declaration order (key columns included)
    pub columns: Vec<ColumnDefinition>,
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    pub unique_keys: Vec<UniqueKeyDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            unique_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKeyDefinition) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn unique_key(mut self, unique_key: UniqueKeyDefinition) -> Self {
        self.unique_keys.push(unique_key);
        self
    }

    /// Primary key columns, in declaration order
    pub fn key_columns(&self) -> Vec<ColumnDefinition> {
        self.columns.iter().filter(|c| c.primary_key).cloned().collect()
    }

    /// Columns added after table creation
    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// One additive DDL change
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    /// CREATE TABLE IF NOT EXISTS with only the key columns
    CreateTable {
        table: String,
        key_columns: Vec<ColumnDefinition>,
    },
    /// ALTER TABLE ADD COLUMN
    AddColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// ALTER TABLE ADD CONSTRAINT ... FOREIGN KEY
    AddForeignKey {
        table: String,
        foreign_key: ForeignKeyDefinition,
    },
    /// ALTER TABLE ADD CONSTRAINT ... UNIQUE
    AddUniqueKey {
        table: String,
        unique_key: UniqueKeyDefinition,
    },
}

impl SchemaChange {
    pub fn table(&self) -> &str {
        match self {
            SchemaChange::CreateTable { table, .. }
            | SchemaChange::AddColumn { table, .. }
            | SchemaChange::AddForeignKey { table, .. }
            | SchemaChange::AddUniqueKey { table, .. } => table,
        }
    }

    /// Short human-readable label used in logs and errors
    pub fn describe(&self) -> String {
        match self {
            SchemaChange::CreateTable { table, .. } => format!("create table {}", table),
            SchemaChange::AddColumn { table, column } => {
                format!("add column {}.{} ({})", table, column.name, column.sql_type)
            }
            SchemaChange::AddForeignKey { table, foreign_key } => format!(
                "add foreign key {} on {}.{} -> {}.{}",
                foreign_key.name,
                table,
                foreign_key.column,
                foreign_key.references_table,
                foreign_key.references_column
            ),
            SchemaChange::AddUniqueKey { table, unique_key } => {
                format!("add unique key {} on {}", unique_key.name, table)
            }
        }
    }
}

/// Schema drift that reconciliation reports but never fixes
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    /// Column type mismatch (requires a manual migration)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
}

impl std::fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaDrift::TypeMismatch {
                table,
                column,
                expected,
                actual,
            } => write!(
                f,
                "{}.{} is {} but {} is declared",
                table, column, actual, expected
            ),
        }
    }
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// DDL changes applied, in order
    pub applied: Vec<SchemaChange>,
    /// Drift detected and left in place
    pub drift: Vec<SchemaDrift>,
}

impl ReconcileReport {
    /// True when the run issued no DDL
    pub fn is_converged(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Reconciliation failures. All of them abort the bootstrap.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid SQL type '{sql_type}' for {table}.{column}")]
    InvalidType {
        table: String,
        column: String,
        sql_type: String,
    },

    #[error("invalid default '{value}' for {table}.{column}")]
    InvalidDefault {
        table: String,
        column: String,
        value: String,
    },

    #[error("table '{0}' is declared more than once")]
    DuplicateTable(String),

    #[error("table '{0}' declares no primary key column")]
    MissingPrimaryKey(String),

    #[error("{table}: constraint '{constraint}' uses undeclared column '{column}'")]
    UnknownColumn {
        table: String,
        constraint: String,
        column: String,
    },

    #[error("{table}: foreign key '{constraint}' references '{references}', which is not declared before it")]
    DependencyOrder {
        table: String,
        constraint: String,
        references: String,
    },

    #[error("metadata probe for {object} failed: {message}")]
    Probe { object: String, message: String },

    #[error("failed to {change}: {message}")]
    Ddl { change: String, message: String },

    #[error("{table}: constraint '{constraint}' is still missing after reconciliation")]
    MissingConstraint { table: String, constraint: String },
}

/// Live-schema access used by the reconciler
///
/// Implementations probe catalog metadata and execute single DDL statements.
/// Every statement commits on its own.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    /// Check if table exists
    async fn table_exists(&self, table: &str) -> crate::Result<bool>;

    /// Declared type of an existing column, `None` when the column is absent
    async fn column_type(&self, table: &str, column: &str) -> crate::Result<Option<String>>;

    /// Check if a constraint of that name exists on the table
    async fn constraint_exists(&self, table: &str, constraint: &str) -> crate::Result<bool>;

    /// Apply one DDL change
    async fn apply(&self, change: &SchemaChange) -> crate::Result<()>;
}

/// Schema comparison helpers
pub struct SchemaDiff;

impl SchemaDiff {
    /// Check if a declared type and a live MySQL column type are compatible
    ///
    /// `INT` matches `int(11)`, `TEXT` matches `text`, and so on. Display widths
    /// and case are ignored; differing base types are not compatible.
    pub fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = Self::normalize(expected);
        let act = Self::normalize(actual);

        if exp == act {
            return true;
        }

        let exp_base = exp.split('(').next().unwrap_or_default().trim();
        let act_base = act.split('(').next().unwrap_or_default().trim();

        // Integer display widths (int(11)) carry no meaning
        let integer = |t: &str| {
            matches!(t, "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT")
        };
        if integer(exp_base) && integer(act_base) {
            let canon = |t: &str| if t == "INTEGER" { "INT" } else { t }.to_string();
            return canon(exp_base) == canon(act_base) && exp.contains("UNSIGNED") == act.contains("UNSIGNED");
        }

        // A declared type without arguments matches any argument list
        !expected.contains('(') && exp_base == act_base
    }

    fn normalize(sql_type: &str) -> String {
        sql_type
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    }

    /// Validate a desired schema before any statement is issued
    pub fn validate(schema: &[TableDefinition]) -> Result<(), SchemaError> {
        let mut declared: Vec<&TableDefinition> = Vec::new();

        for table in schema {
            Self::check_identifier(&table.name)?;

            if declared.iter().any(|t| t.name == table.name) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }

            if !table.columns.iter().any(|c| c.primary_key) {
                return Err(SchemaError::MissingPrimaryKey(table.name.clone()));
            }

            for column in &table.columns {
                Self::check_identifier(&column.name)?;
                if let Some(collation) = &column.collation {
                    Self::check_identifier(collation)?;
                }
                if !is_valid_sql_type(&column.sql_type) {
                    return Err(SchemaError::InvalidType {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        sql_type: column.sql_type.clone(),
                    });
                }
                if let Some(value) = &column.default_value {
                    if !is_valid_default(value) {
                        return Err(SchemaError::InvalidDefault {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            value: value.clone(),
                        });
                    }
                }
            }

            for fk in &table.foreign_keys {
                Self::check_identifier(&fk.name)?;
                Self::check_identifier(&fk.references_table)?;
                Self::check_identifier(&fk.references_column)?;

                if !table.has_column(&fk.column) {
                    return Err(SchemaError::UnknownColumn {
                        table: table.name.clone(),
                        constraint: fk.name.clone(),
                        column: fk.column.clone(),
                    });
                }

                let referenced = if fk.references_table == table.name {
                    Some(table)
                } else {
                    declared.iter().copied().find(|t| t.name == fk.references_table)
                };
                let Some(referenced) = referenced else {
                    return Err(SchemaError::DependencyOrder {
                        table: table.name.clone(),
                        constraint: fk.name.clone(),
                        references: fk.references_table.clone(),
                    });
                };
                if !referenced.has_column(&fk.references_column) {
                    return Err(SchemaError::UnknownColumn {
                        table: referenced.name.clone(),
                        constraint: fk.name.clone(),
                        column: fk.references_column.clone(),
                    });
                }
            }

            for unique in &table.unique_keys {
                Self::check_identifier(&unique.name)?;
                if unique.parts.is_empty() {
                    return Err(SchemaError::UnknownColumn {
                        table: table.name.clone(),
                        constraint: unique.name.clone(),
                        column: String::new(),
                    });
                }
                for part in &unique.parts {
                    if !table.has_column(&part.column) {
                        return Err(SchemaError::UnknownColumn {
                            table: table.name.clone(),
                            constraint: unique.name.clone(),
                            column: part.column.clone(),
                        });
                    }
                }
            }

            declared.push(table);
        }

        Ok(())
    }

    fn check_identifier(name: &str) -> Result<(), SchemaError> {
        if is_valid_identifier(name) {
            Ok(())
        } else {
            Err(SchemaError::InvalidIdentifier(name.to_string()))
        }
    }
}

/// Schema synchronization - apply schema changes to database
pub struct SchemaSync;

impl SchemaSync {
    /// Reconcile the live schema with `schema`
    ///
    /// Tables are processed in declaration order, so a table must be declared
    /// after every table its foreign keys reference.
    ///
    /// **What this CAN fix:**
    /// - Missing tables, columns, foreign keys and unique keys
    ///
    /// **What this CANNOT fix (requires manual migration):**
    /// - Type changes, column removal, constraint redefinition
    pub async fn reconcile<B>(
        backend: &B,
        schema: &[TableDefinition],
    ) -> Result<ReconcileReport, SchemaError>
    where
        B: SchemaBackend + ?Sized,
    {
        SchemaDiff::validate(schema)?;

        let mut report = ReconcileReport::default();

        info!("Schema sync: reconciling {} tables", schema.len());

        // Phase 1: tables
        for table in schema {
            let exists = probe(&table.name, backend.table_exists(&table.name)).await?;
            if exists {
                debug!("  Table '{}' present", table.name);
                continue;
            }
            let change = SchemaChange::CreateTable {
                table: table.name.clone(),
                key_columns: table.key_columns(),
            };
            Self::apply(backend, change, &mut report).await?;
        }

        // Phase 2: columns, all tables before any constraint
        for table in schema {
            for column in table.non_key_columns() {
                let object = format!("column {}.{}", table.name, column.name);
                let actual = probe(&object, backend.column_type(&table.name, &column.name)).await?;

                match actual {
                    None => {
                        let change = SchemaChange::AddColumn {
                            table: table.name.clone(),
                            column: column.clone(),
                        };
                        Self::apply(backend, change, &mut report).await?;
                    }
                    Some(actual) if !SchemaDiff::types_compatible(&column.sql_type, &actual) => {
                        warn!(
                            "  ⚠ Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                            table.name, column.name, column.sql_type, actual
                        );
                        report.drift.push(SchemaDrift::TypeMismatch {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            expected: column.sql_type.clone(),
                            actual,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        // Phase 3: constraints
        for table in schema {
            for fk in &table.foreign_keys {
                if !Self::constraint_present(backend, &table.name, &fk.name).await? {
                    let change = SchemaChange::AddForeignKey {
                        table: table.name.clone(),
                        foreign_key: fk.clone(),
                    };
                    Self::apply(backend, change, &mut report).await?;
                }
            }

            for unique in &table.unique_keys {
                if !Self::constraint_present(backend, &table.name, &unique.name).await? {
                    let change = SchemaChange::AddUniqueKey {
                        table: table.name.clone(),
                        unique_key: unique.clone(),
                    };
                    Self::apply(backend, change, &mut report).await?;
                }
            }
        }

        // Phase 4: verify that every declared constraint is in place
        Self::verify_constraints(backend, schema).await?;

        if report.is_converged() {
            info!("  ✓ Schema up to date");
        } else {
            info!("  ✓ Schema sync applied {} changes", report.applied.len());
        }

        Ok(report)
    }

    /// Check that every declared foreign key and unique key exists
    pub async fn verify_constraints<B>(backend: &B, schema: &[TableDefinition]) -> Result<(), SchemaError>
    where
        B: SchemaBackend + ?Sized,
    {
        for table in schema {
            let names = table
                .foreign_keys
                .iter()
                .map(|fk| fk.name.as_str())
                .chain(table.unique_keys.iter().map(|u| u.name.as_str()));

            for name in names {
                if !Self::constraint_present(backend, &table.name, name).await? {
                    return Err(SchemaError::MissingConstraint {
                        table: table.name.clone(),
                        constraint: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn constraint_present<B>(backend: &B, table: &str, constraint: &str) -> Result<bool, SchemaError>
    where
        B: SchemaBackend + ?Sized,
    {
        let object = format!("constraint {}.{}", table, constraint);
        probe(&object, backend.constraint_exists(table, constraint)).await
    }

    async fn apply<B>(backend: &B, change: SchemaChange, report: &mut ReconcileReport) -> Result<(), SchemaError>
    where
        B: SchemaBackend + ?Sized,
    {
        if let SchemaChange::AddColumn { table, column } = &change {
            if column.not_null && column.default_value.is_none() {
                warn!(
                    "  ⚠ Cannot add NOT NULL column {}.{} without DEFAULT value. \
                     Column will be nullable.",
                    table, column.name
                );
            }
        }

        info!("  ✓ Applying: {}", change.describe());

        backend.apply(&change).await.map_err(|e| SchemaError::Ddl {
            change: change.describe(),
            message: e.to_string(),
        })?;

        report.applied.push(change);
        Ok(())
    }
}

async fn probe<T>(
    object: &str,
    fut: impl std::future::Future<Output = crate::Result<T>>,
) -> Result<T, SchemaError> {
    fut.await.map_err(|e| SchemaError::Probe {
        object: object.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemorySchemaBackend;

    fn artists() -> TableDefinition {
        TableDefinition::new("artists")
            .column(ColumnDefinition::new("id", "INT").primary_key().auto_increment())
            .column(ColumnDefinition::new("name", "TEXT"))
    }

    fn albums() -> TableDefinition {
        TableDefinition::new("albums")
            .column(ColumnDefinition::new("id", "INT").primary_key().auto_increment())
            .column(ColumnDefinition::new("title", "TEXT"))
            .column(ColumnDefinition::new("year", "INT"))
            .column(ColumnDefinition::new("artist_id", "INT"))
            .foreign_key(ForeignKeyDefinition::new("fk_albums_artist", "artist_id", "artists", "id"))
            .unique_key(
                UniqueKeyDefinition::new("unique_album")
                    .column_prefix("title", 255)
                    .column("artist_id"),
            )
    }

    #[test]
    fn test_column_definition_builder() {
        let col = ColumnDefinition::new("test_col", "TEXT")
            .not_null()
            .default("'default_value'");

        assert_eq!(col.name, "test_col");
        assert_eq!(col.sql_type, "TEXT");
        assert!(col.not_null);
        assert!(!col.primary_key);
        assert_eq!(col.default_value, Some("'default_value'".to_string()));

        let key = ColumnDefinition::new("id", "INT").primary_key().auto_increment();
        assert!(key.primary_key && key.not_null && key.auto_increment);
    }

    #[test]
    fn test_types_compatible() {
        // Exact match, case insensitive
        assert!(SchemaDiff::types_compatible("TEXT", "text"));
        assert!(SchemaDiff::types_compatible("DATE", "date"));

        // Integer display widths
        assert!(SchemaDiff::types_compatible("INT", "int(11)"));
        assert!(SchemaDiff::types_compatible("INTEGER", "int"));
        assert!(SchemaDiff::types_compatible("BIGINT", "bigint(20)"));

        // Declared type without arguments matches any length
        assert!(SchemaDiff::types_compatible("VARCHAR", "varchar(255)"));

        // Incompatible
        assert!(!SchemaDiff::types_compatible("TEXT", "int"));
        assert!(!SchemaDiff::types_compatible("INT", "bigint"));
        assert!(!SchemaDiff::types_compatible("INT", "int unsigned"));
        assert!(!SchemaDiff::types_compatible("VARCHAR(100)", "varchar(255)"));
        assert!(!SchemaDiff::types_compatible("DATE", "datetime"));
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let table = TableDefinition::new("albums; DROP TABLE users")
            .column(ColumnDefinition::new("id", "INT").primary_key());
        assert!(matches!(
            SchemaDiff::validate(&[table]),
            Err(SchemaError::InvalidIdentifier(_))
        ));

        let table = TableDefinition::new("albums")
            .column(ColumnDefinition::new("id", "INT").primary_key())
            .column(ColumnDefinition::new("title", "TEXT); DROP TABLE users; --"));
        assert!(matches!(
            SchemaDiff::validate(&[table]),
            Err(SchemaError::InvalidType { .. })
        ));

        let table = TableDefinition::new("albums")
            .column(ColumnDefinition::new("id", "INT").primary_key())
            .column(ColumnDefinition::new("title", "TEXT").collate("utf8mb4_bin; DROP TABLE users"));
        assert!(matches!(
            SchemaDiff::validate(&[table]),
            Err(SchemaError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_validate_requires_dependency_order() {
        assert!(matches!(
            SchemaDiff::validate(&[albums(), artists()]),
            Err(SchemaError::DependencyOrder { .. })
        ));
        assert!(SchemaDiff::validate(&[artists(), albums()]).is_ok());
    }

    #[test]
    fn test_validate_rejects_undeclared_constraint_columns() {
        let table = albums().unique_key(UniqueKeyDefinition::new("unique_missing").column("label"));
        assert!(matches!(
            SchemaDiff::validate(&[artists(), table]),
            Err(SchemaError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_validate_requires_primary_key() {
        let table = TableDefinition::new("orphans").column(ColumnDefinition::new("name", "TEXT"));
        assert!(matches!(
            SchemaDiff::validate(&[table]),
            Err(SchemaError::MissingPrimaryKey(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_database_creates_everything() {
        let backend = MemorySchemaBackend::new();
        let report = SchemaSync::reconcile(&backend, &[artists(), albums()])
            .await
            .unwrap();

        // 2 tables + 4 columns + 1 FK + 1 unique key
        assert_eq!(report.applied.len(), 8);
        assert!(matches!(report.applied[0], SchemaChange::CreateTable { .. }));
        assert!(matches!(report.applied[1], SchemaChange::CreateTable { .. }));

        // Every column addition precedes every constraint addition
        let last_column = report
            .applied
            .iter()
            .rposition(|c| matches!(c, SchemaChange::AddColumn { .. }))
            .unwrap();
        let first_constraint = report
            .applied
            .iter()
            .position(|c| matches!(c, SchemaChange::AddForeignKey { .. } | SchemaChange::AddUniqueKey { .. }))
            .unwrap();
        assert!(last_column < first_constraint);

        assert_eq!(
            backend.columns("albums"),
            vec!["id", "title", "year", "artist_id"]
        );
        assert!(backend.has_constraint("albums", "fk_albums_artist"));
        assert!(backend.has_constraint("albums", "unique_album"));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let backend = MemorySchemaBackend::new();
        let schema = [artists(), albums()];

        SchemaSync::reconcile(&backend, &schema).await.unwrap();
        let statements_after_first = backend.statement_count();

        let report = SchemaSync::reconcile(&backend, &schema).await.unwrap();

        assert!(report.is_converged());
        assert_eq!(backend.statement_count(), statements_after_first);
    }

    #[tokio::test]
    async fn test_adds_only_missing_columns() {
        let backend = MemorySchemaBackend::new()
            .with_table("artists", &[("id", "int(11)"), ("name", "text")])
            .with_table("albums", &[("id", "int(11)"), ("title", "text")]);

        let report = SchemaSync::reconcile(&backend, &[artists(), albums()])
            .await
            .unwrap();

        let added: Vec<String> = report
            .applied
            .iter()
            .filter_map(|c| match c {
                SchemaChange::AddColumn { table, column } => Some(format!("{}.{}", table, column.name)),
                _ => None,
            })
            .collect();

        assert_eq!(added, vec!["albums.year", "albums.artist_id"]);
        assert!(!report
            .applied
            .iter()
            .any(|c| matches!(c, SchemaChange::CreateTable { .. })));
        assert_eq!(backend.column_type_of("albums", "title").as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported_not_altered() {
        let backend = MemorySchemaBackend::new()
            .with_table("artists", &[("id", "int(11)"), ("name", "int(11)")]);

        let report = SchemaSync::reconcile(&backend, &[artists()]).await.unwrap();

        assert!(report.is_converged());
        assert_eq!(
            report.drift,
            vec![SchemaDrift::TypeMismatch {
                table: "artists".to_string(),
                column: "name".to_string(),
                expected: "TEXT".to_string(),
                actual: "int(11)".to_string(),
            }]
        );
        assert_eq!(backend.column_type_of("artists", "name").as_deref(), Some("int(11)"));
    }

    #[tokio::test]
    async fn test_ddl_failure_aborts_reconciliation() {
        let backend = MemorySchemaBackend::new().fail_on("add column albums.year");

        let err = SchemaSync::reconcile(&backend, &[artists(), albums()])
            .await
            .unwrap_err();

        assert!(matches!(err, SchemaError::Ddl { .. }));
        // Nothing after the failing statement ran
        assert!(!backend.has_constraint("albums", "fk_albums_artist"));
        assert!(!backend.columns("albums").contains(&"artist_id".to_string()));
    }

    #[tokio::test]
    async fn test_resume_after_partial_failure() {
        let backend = MemorySchemaBackend::new().fail_on("add column albums.year");
        let schema = [artists(), albums()];
        assert!(SchemaSync::reconcile(&backend, &schema).await.is_err());

        backend.clear_failures();
        let report = SchemaSync::reconcile(&backend, &schema).await.unwrap();

        assert!(report
            .applied
            .iter()
            .all(|c| !matches!(c, SchemaChange::CreateTable { .. })));
        assert!(backend.has_constraint("albums", "unique_album"));
    }

    #[tokio::test]
    async fn test_missing_constraint_after_reconcile_is_an_error() {
        // Backend accepts the DDL but never records unique keys
        let backend = MemorySchemaBackend::new().drop_unique_keys();

        let err = SchemaSync::reconcile(&backend, &[artists(), albums()])
            .await
            .unwrap_err();

        match err {
            SchemaError::MissingConstraint { table, constraint } => {
                assert_eq!(table, "albums");
                assert_eq!(constraint, "unique_album");
            }
            other => panic!("Expected MissingConstraint, got {:?}", other),
        }
    }
}
