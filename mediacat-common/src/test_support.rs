//! In-memory implementations of the schema and catalog ports
//!
//! Compiled for this crate's tests and, through the `test-support` feature,
//! for downstream integration tests. They follow the MySQL behaviour the
//! reconciler, resolver and importer depend on: DDL on missing objects fails,
//! duplicate objects fail, the media unique key rejects repeated
//! (title, artist_id, format_id) combinations, and foreign keys are checked.

use crate::db::catalog_store::CatalogStore;
use crate::db::models::{
    split_genre_tags, ArtistId, FormatId, InsertOutcome, MediaDetail, MediaId, NewMedia,
    UpdateOutcome,
};
use crate::db::schema_sync::{SchemaBackend, SchemaChange};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

fn simulated(message: impl Into<String>) -> Error {
    Error::Database(sqlx::Error::Protocol(message.into()))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Schema backend
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryTable {
    name: String,
    columns: Vec<(String, String)>,
    constraints: Vec<String>,
}

#[derive(Debug, Default)]
struct SchemaState {
    tables: Vec<MemoryTable>,
    statements: usize,
    failures: Vec<String>,
    drop_unique_keys: bool,
}

impl SchemaState {
    fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| simulated(format!("Table '{}' doesn't exist", name)))
    }

    fn require_column(&self, table: &str, column: &str) -> Result<()> {
        let present = self
            .table(table)
            .is_some_and(|t| t.columns.iter().any(|(name, _)| name == column));
        if present {
            Ok(())
        } else {
            Err(simulated(format!("Key column '{}' doesn't exist in table '{}'", column, table)))
        }
    }

    fn add_constraint(&mut self, table: &str, name: &str) -> Result<()> {
        let table = self.table_mut(table)?;
        if table.constraints.iter().any(|c| c == name) {
            return Err(simulated(format!("Duplicate key name '{}'", name)));
        }
        table.constraints.push(name.to_string());
        Ok(())
    }
}

/// [`SchemaBackend`] holding tables, columns and constraint names in memory
#[derive(Debug, Default)]
pub struct MemorySchemaBackend {
    state: Mutex<SchemaState>,
}

impl MemorySchemaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing table with `(name, type)` columns
    pub fn with_table(self, name: &str, columns: &[(&str, &str)]) -> Self {
        lock(&self.state).tables.push(MemoryTable {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            constraints: Vec::new(),
        });
        self
    }

    /// Seed an existing constraint on a seeded table
    pub fn with_constraint(self, table: &str, constraint: &str) -> Self {
        if let Some(t) = lock(&self.state).tables.iter_mut().find(|t| t.name == table) {
            t.constraints.push(constraint.to_string());
        }
        self
    }

    /// Fail every change whose [`SchemaChange::describe`] starts with `prefix`
    pub fn fail_on(self, prefix: &str) -> Self {
        lock(&self.state).failures.push(prefix.to_string());
        self
    }

    /// Accept unique-key DDL without recording the key
    pub fn drop_unique_keys(self) -> Self {
        lock(&self.state).drop_unique_keys = true;
        self
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures.clear();
    }

    /// Successfully applied DDL statements
    pub fn statement_count(&self) -> usize {
        lock(&self.state).statements
    }

    /// Column names of a table in position order
    pub fn columns(&self, table: &str) -> Vec<String> {
        lock(&self.state)
            .table(table)
            .map(|t| t.columns.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    pub fn column_type_of(&self, table: &str, column: &str) -> Option<String> {
        lock(&self.state).table(table).and_then(|t| {
            t.columns
                .iter()
                .find(|(n, _)| n == column)
                .map(|(_, ty)| ty.clone())
        })
    }

    pub fn has_constraint(&self, table: &str, constraint: &str) -> bool {
        lock(&self.state)
            .table(table)
            .is_some_and(|t| t.constraints.iter().any(|c| c == constraint))
    }
}

#[async_trait]
impl SchemaBackend for MemorySchemaBackend {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(lock(&self.state).table(table).is_some())
    }

    async fn column_type(&self, table: &str, column: &str) -> Result<Option<String>> {
        Ok(self.column_type_of(table, column))
    }

    async fn constraint_exists(&self, table: &str, constraint: &str) -> Result<bool> {
        Ok(self.has_constraint(table, constraint))
    }

    async fn apply(&self, change: &SchemaChange) -> Result<()> {
        let mut state = lock(&self.state);

        let description = change.describe();
        if state.failures.iter().any(|f| description.starts_with(f.as_str())) {
            return Err(simulated(format!("simulated failure: {}", description)));
        }

        match change {
            SchemaChange::CreateTable { table, key_columns } => {
                if state.table(table).is_none() {
                    state.tables.push(MemoryTable {
                        name: table.clone(),
                        columns: key_columns
                            .iter()
                            .map(|c| (c.name.clone(), c.sql_type.to_lowercase()))
                            .collect(),
                        constraints: Vec::new(),
                    });
                }
            }
            SchemaChange::AddColumn { table, column } => {
                let t = state.table_mut(table)?;
                if t.columns.iter().any(|(n, _)| *n == column.name) {
                    return Err(simulated(format!("Duplicate column name '{}'", column.name)));
                }
                t.columns
                    .push((column.name.clone(), column.sql_type.to_lowercase()));
            }
            SchemaChange::AddForeignKey { table, foreign_key } => {
                state.require_column(table, &foreign_key.column)?;
                state.require_column(&foreign_key.references_table, &foreign_key.references_column)?;
                state.add_constraint(table, &foreign_key.name)?;
            }
            SchemaChange::AddUniqueKey { table, unique_key } => {
                for part in &unique_key.parts {
                    state.require_column(table, &part.column)?;
                }
                if !state.drop_unique_keys {
                    state.add_constraint(table, &unique_key.name)?;
                }
            }
        }

        state.statements += 1;
        Ok(())
    }
}

// ============================================================================
// Catalog store
// ============================================================================

#[derive(Debug, Clone)]
struct ArtistRow {
    id: ArtistId,
    name: String,
}

#[derive(Debug, Clone)]
struct FormatRow {
    id: FormatId,
    name: String,
    description: String,
}

#[derive(Debug, Clone)]
struct MediaRow {
    id: MediaId,
    media: NewMedia,
}

#[derive(Debug)]
struct CatalogState {
    artists: Vec<ArtistRow>,
    formats: Vec<FormatRow>,
    media: Vec<MediaRow>,
    next_id: i64,
    media_unique_key: bool,
    fail_media_inserts: bool,
}

impl CatalogState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_references(&self, media: &NewMedia) -> Result<()> {
        if !self.artists.iter().any(|a| a.id == media.artist_id) {
            return Err(simulated("foreign key constraint fails (fk_media_artist)"));
        }
        if !self.formats.iter().any(|f| f.id == media.format_id) {
            return Err(simulated("foreign key constraint fails (fk_media_format)"));
        }
        Ok(())
    }

    fn conflicts(&self, media: &NewMedia, except: Option<MediaId>) -> bool {
        self.media_unique_key
            && self.media.iter().any(|row| {
                Some(row.id) != except
                    && row.media.title == media.title
                    && row.media.artist_id == media.artist_id
                    && row.media.format_id == media.format_id
            })
    }

    fn detail(&self, row: &MediaRow) -> MediaDetail {
        let artist = self
            .artists
            .iter()
            .find(|a| a.id == row.media.artist_id)
            .map(|a| a.name.clone())
            .unwrap_or_default();
        let format = self
            .formats
            .iter()
            .find(|f| f.id == row.media.format_id)
            .map(|f| f.name.clone())
            .unwrap_or_default();

        MediaDetail {
            id: row.id,
            title: row.media.title.clone(),
            date_published: row.media.date_published,
            image_url: row.media.image_url.clone(),
            genre_tags: split_genre_tags(&row.media.genre_tags),
            artist_id: row.media.artist_id,
            artist,
            format_id: row.media.format_id,
            format,
        }
    }
}

/// [`CatalogStore`] over in-memory tables
#[derive(Debug)]
pub struct MemoryCatalogStore {
    state: Mutex<CatalogState>,
}

impl Default for MemoryCatalogStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(CatalogState {
                artists: Vec::new(),
                formats: Vec::new(),
                media: Vec::new(),
                next_id: 0,
                media_unique_key: true,
                fail_media_inserts: false,
            }),
        }
    }
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a media table created without `unique_media`
    pub fn without_media_unique_key(self) -> Self {
        lock(&self.state).media_unique_key = false;
        self
    }

    /// Fail every media insert with a non-uniqueness database error
    pub fn fail_media_inserts(self) -> Self {
        lock(&self.state).fail_media_inserts = true;
        self
    }

    pub fn artist_names(&self) -> Vec<String> {
        lock(&self.state).artists.iter().map(|a| a.name.clone()).collect()
    }

    pub fn format_count(&self) -> usize {
        lock(&self.state).formats.len()
    }

    pub fn media_count(&self) -> usize {
        lock(&self.state).media.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<ArtistId>> {
        Ok(lock(&self.state)
            .artists
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.id))
    }

    async fn insert_artist(&self, name: &str) -> Result<ArtistId> {
        let mut state = lock(&self.state);
        let id = ArtistId(state.next_id());
        state.artists.push(ArtistRow {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn artist_exists(&self, id: ArtistId) -> Result<bool> {
        Ok(lock(&self.state).artists.iter().any(|a| a.id == id))
    }

    async fn find_format_by_name(&self, name: &str) -> Result<Option<FormatId>> {
        Ok(lock(&self.state)
            .formats
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.id))
    }

    async fn find_format(&self, name: &str, description: &str) -> Result<Option<FormatId>> {
        Ok(lock(&self.state)
            .formats
            .iter()
            .find(|f| f.name == name && f.description == description)
            .map(|f| f.id))
    }

    async fn insert_format(&self, name: &str, description: &str) -> Result<FormatId> {
        let mut state = lock(&self.state);
        let id = FormatId(state.next_id());
        state.formats.push(FormatRow {
            id,
            name: name.to_string(),
            description: description.to_string(),
        });
        Ok(id)
    }

    async fn format_exists(&self, id: FormatId) -> Result<bool> {
        Ok(lock(&self.state).formats.iter().any(|f| f.id == id))
    }

    async fn insert_media(&self, media: &NewMedia) -> Result<InsertOutcome> {
        let mut state = lock(&self.state);

        if state.fail_media_inserts {
            return Err(simulated("simulated insert failure"));
        }
        state.check_references(media)?;
        if state.conflicts(media, None) {
            return Ok(InsertOutcome::Duplicate);
        }

        let id = MediaId(state.next_id());
        state.media.push(MediaRow {
            id,
            media: media.clone(),
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn list_media(&self) -> Result<Vec<MediaDetail>> {
        let state = lock(&self.state);
        Ok(state.media.iter().map(|row| state.detail(row)).collect())
    }

    async fn get_media(&self, id: MediaId) -> Result<Option<MediaDetail>> {
        let state = lock(&self.state);
        Ok(state
            .media
            .iter()
            .find(|row| row.id == id)
            .map(|row| state.detail(row)))
    }

    async fn update_media(&self, id: MediaId, media: &NewMedia) -> Result<UpdateOutcome> {
        let mut state = lock(&self.state);

        if !state.media.iter().any(|row| row.id == id) {
            return Ok(UpdateOutcome::NotFound);
        }
        state.check_references(media)?;
        if state.conflicts(media, Some(id)) {
            return Ok(UpdateOutcome::Duplicate);
        }

        if let Some(row) = state.media.iter_mut().find(|row| row.id == id) {
            row.media = media.clone();
        }
        Ok(UpdateOutcome::Updated)
    }

    async fn delete_media(&self, id: MediaId) -> Result<bool> {
        let mut state = lock(&self.state);
        let before = state.media.len();
        state.media.retain(|row| row.id != id);
        Ok(state.media.len() < before)
    }
}
