//! Catalog persistence port
//!
//! Row-level access to artists, formats and media. The resolver, the importer
//! and the HTTP handlers only talk to this trait; [`MySqlCatalogStore`] is the
//! production implementation.
//!
//! [`MySqlCatalogStore`]: crate::db::mysql_store::MySqlCatalogStore

use crate::db::models::{
    ArtistId, FormatId, InsertOutcome, MediaDetail, MediaId, NewMedia, UpdateOutcome,
};
use crate::Result;
use async_trait::async_trait;

/// Row-level catalog access
///
/// Lookups are exact matches on the natural key. Inserts never deduplicate on
/// their own; callers look up first.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Id of the first artist with exactly this name
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<ArtistId>>;

    /// Insert an artist and return its generated id
    async fn insert_artist(&self, name: &str) -> Result<ArtistId>;

    async fn artist_exists(&self, id: ArtistId) -> Result<bool>;

    /// Id of the first format with exactly this name
    async fn find_format_by_name(&self, name: &str) -> Result<Option<FormatId>>;

    /// Id of the format with exactly this (name, description) pair
    async fn find_format(&self, name: &str, description: &str) -> Result<Option<FormatId>>;

    /// Insert a format and return its generated id
    async fn insert_format(&self, name: &str, description: &str) -> Result<FormatId>;

    async fn format_exists(&self, id: FormatId) -> Result<bool>;

    /// Insert a media row
    ///
    /// A uniqueness violation is reported as [`InsertOutcome::Duplicate`];
    /// every other failure is an error.
    async fn insert_media(&self, media: &NewMedia) -> Result<InsertOutcome>;

    /// All media rows with artist and format names
    async fn list_media(&self) -> Result<Vec<MediaDetail>>;

    async fn get_media(&self, id: MediaId) -> Result<Option<MediaDetail>>;

    async fn update_media(&self, id: MediaId, media: &NewMedia) -> Result<UpdateOutcome>;

    /// Delete a media row; false when no row had that id
    async fn delete_media(&self, id: MediaId) -> Result<bool>;
}
