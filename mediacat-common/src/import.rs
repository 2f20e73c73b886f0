//! Bulk catalog import
//!
//! Reads format and media records and writes them through the
//! [`NaturalKeyResolver`]. Records are processed in input order with one
//! database round-trip per lookup or insert; there is no in-memory dedup pass.
//! Duplicate media are detected by the `unique_media` key and skipped.

use crate::db::catalog_store::CatalogStore;
use crate::db::models::{join_genre_tags, InsertOutcome, NewMedia};
use crate::db::resolver::NaturalKeyResolver;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One entry of the formats file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRecord {
    pub name: String,
    pub description: String,
}

/// One entry of the media file, keyed by artist and format names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub title: String,
    pub artist: String,
    pub format: String,
    pub date_published: NaiveDate,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub genre_tags: Vec<String>,
}

/// Counters for one import batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Records read
    pub processed: usize,
    /// Rows inserted into the target table
    pub inserted: usize,
    /// Media rows skipped because of the unique key
    pub duplicates: usize,
    /// Formats already present
    pub existing: usize,
    /// Artists created while resolving media
    pub artists_created: usize,
}

/// Read a JSON array of format records
pub async fn load_format_records(path: &Path) -> Result<Vec<FormatRecord>> {
    load_json_array(path).await
}

/// Read a JSON array of media records
pub async fn load_media_records(path: &Path) -> Result<Vec<MediaRecord>> {
    load_json_array(path).await
}

async fn load_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|e| {
        Error::InvalidInput(format!("Failed to decode {}: {}", path.display(), e))
    })
}

pub struct CatalogImporter<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    resolver: NaturalKeyResolver<'a, S>,
}

impl<'a, S: CatalogStore + ?Sized> CatalogImporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            resolver: NaturalKeyResolver::new(store),
        }
    }

    /// Create every (name, description) pair not already present
    ///
    /// First write wins: an existing format is never updated.
    pub async fn import_formats(&self, records: &[FormatRecord]) -> Result<ImportStats> {
        let mut stats = ImportStats::default();

        for record in records {
            stats.processed += 1;

            let resolved = self
                .resolver
                .ensure_format(&record.name, &record.description)
                .await
                .map_err(|e| Error::Import(format!("format '{}': {}", record.name, e)))?;

            if resolved.created {
                stats.inserted += 1;
            } else {
                stats.existing += 1;
            }
        }

        info!(
            "Imported formats: {} processed, {} inserted, {} already present",
            stats.processed, stats.inserted, stats.existing
        );
        Ok(stats)
    }

    /// Insert every media record whose key combination is not yet present
    ///
    /// Fails the whole batch on the first record whose format is unknown
    /// ([`Error::Resolution`]) or whose insert fails for any reason other than
    /// the unique key ([`Error::Import`]). Rows inserted before the failure
    /// stay in place.
    pub async fn import_media(&self, records: &[MediaRecord]) -> Result<ImportStats> {
        let mut stats = ImportStats::default();

        for record in records {
            stats.processed += 1;

            let artist = self
                .resolver
                .ensure_artist(&record.artist)
                .await
                .map_err(|e| Error::Import(format!("artist '{}': {}", record.artist, e)))?;
            if artist.created {
                stats.artists_created += 1;
            }

            let format_id = match self.resolver.lookup_format(&record.format).await {
                Ok(id) => id,
                Err(e @ Error::Resolution(_)) => return Err(e),
                Err(e) => return Err(Error::Import(format!("format '{}': {}", record.format, e))),
            };

            let genre_tags = join_genre_tags(&record.genre_tags)
                .map_err(|e| Error::Import(format!("media '{}': {}", record.title, e)))?;

            let media = NewMedia {
                title: record.title.clone(),
                date_published: Some(record.date_published),
                image_url: record.image_url.clone(),
                genre_tags,
                artist_id: artist.id,
                format_id,
            };

            match self.store.insert_media(&media).await {
                Ok(InsertOutcome::Inserted(id)) => {
                    debug!("Inserted media '{}' (id {})", record.title, id);
                    stats.inserted += 1;
                }
                Ok(InsertOutcome::Duplicate) => {
                    debug!("Media '{}' already imported, skipping", record.title);
                    stats.duplicates += 1;
                }
                Err(e) => {
                    return Err(Error::Import(format!(
                        "failed to insert media '{}': {}",
                        record.title, e
                    )));
                }
            }
        }

        info!(
            "Imported media: {} processed, {} inserted, {} duplicates, {} new artists",
            stats.processed, stats.inserted, stats.duplicates, stats.artists_created
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::split_genre_tags;
    use crate::test_support::MemoryCatalogStore;

    fn lp() -> FormatRecord {
        FormatRecord {
            name: "LP".to_string(),
            description: "Vinyl record".to_string(),
        }
    }

    fn ok_computer() -> MediaRecord {
        MediaRecord {
            title: "OK Computer".to_string(),
            artist: "Radiohead".to_string(),
            format: "LP".to_string(),
            date_published: NaiveDate::from_ymd_opt(1997, 5, 21).unwrap(),
            image_url: String::new(),
            genre_tags: vec!["alt rock".to_string(), "electronic".to_string()],
        }
    }

    #[tokio::test]
    async fn test_import_formats_first_write_wins() {
        let store = MemoryCatalogStore::new();
        let importer = CatalogImporter::new(&store);

        let stats = importer.import_formats(&[lp(), lp()]).await.unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.existing, 1);
        assert_eq!(store.format_count(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_import() {
        let store = MemoryCatalogStore::new();
        let importer = CatalogImporter::new(&store);

        importer.import_formats(&[lp()]).await.unwrap();
        let stats = importer.import_media(&[ok_computer()]).await.unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.artists_created, 1);
        assert_eq!(store.artist_names(), vec!["Radiohead"]);

        let media = store.list_media().await.unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].title, "OK Computer");
        assert_eq!(media[0].artist, "Radiohead");
        assert_eq!(media[0].format, "LP");
        assert_eq!(media[0].genre_tags, vec!["alt rock", "electronic"]);
        assert_eq!(
            media[0].date_published,
            NaiveDate::from_ymd_opt(1997, 5, 21)
        );
    }

    #[tokio::test]
    async fn test_reimport_changes_nothing() {
        let store = MemoryCatalogStore::new();
        let importer = CatalogImporter::new(&store);

        importer.import_formats(&[lp()]).await.unwrap();
        importer.import_media(&[ok_computer()]).await.unwrap();

        let formats = importer.import_formats(&[lp()]).await.unwrap();
        let media = importer.import_media(&[ok_computer()]).await.unwrap();

        assert_eq!(formats.inserted, 0);
        assert_eq!(media.inserted, 0);
        assert_eq!(media.duplicates, 1);
        assert_eq!(media.artists_created, 0);
        assert_eq!(store.format_count(), 1);
        assert_eq!(store.artist_names().len(), 1);
        assert_eq!(store.media_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch_are_skipped() {
        let store = MemoryCatalogStore::new();
        let importer = CatalogImporter::new(&store);

        importer.import_formats(&[lp()]).await.unwrap();
        let stats = importer
            .import_media(&[ok_computer(), ok_computer()])
            .await
            .unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(store.media_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_format_is_rejected() {
        let store = MemoryCatalogStore::new();
        let importer = CatalogImporter::new(&store);

        let err = importer.import_media(&[ok_computer()]).await.unwrap_err();

        assert!(matches!(err, Error::Resolution(_)));
        assert_eq!(store.media_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_rows() {
        let store = MemoryCatalogStore::new();
        let importer = CatalogImporter::new(&store);
        importer.import_formats(&[lp()]).await.unwrap();

        let mut cassette = ok_computer();
        cassette.title = "Kid A".to_string();
        cassette.format = "Cassette".to_string();

        let err = importer
            .import_media(&[ok_computer(), cassette])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolution(_)));
        assert_eq!(store.media_count(), 1);
    }

    #[tokio::test]
    async fn test_without_unique_key_duplicates_are_inserted() {
        let store = MemoryCatalogStore::new().without_media_unique_key();
        let importer = CatalogImporter::new(&store);

        importer.import_formats(&[lp()]).await.unwrap();
        importer.import_media(&[ok_computer()]).await.unwrap();
        importer.import_media(&[ok_computer()]).await.unwrap();

        assert_eq!(store.media_count(), 2);
    }

    #[tokio::test]
    async fn test_insert_failure_aborts_batch() {
        let store = MemoryCatalogStore::new().fail_media_inserts();
        let importer = CatalogImporter::new(&store);
        importer.import_formats(&[lp()]).await.unwrap();

        let err = importer.import_media(&[ok_computer()]).await.unwrap_err();

        assert!(matches!(err, Error::Import(_)));
    }

    #[tokio::test]
    async fn test_tag_with_delimiter_aborts_batch() {
        let store = MemoryCatalogStore::new();
        let importer = CatalogImporter::new(&store);
        importer.import_formats(&[lp()]).await.unwrap();

        let mut record = ok_computer();
        record.genre_tags = vec!["rock,pop".to_string()];

        let err = importer.import_media(&[record]).await.unwrap_err();
        assert!(matches!(err, Error::Import(_)));
        assert_eq!(store.media_count(), 0);
    }

    #[test]
    fn test_media_record_decodes_file_layout() {
        let json = r#"[{
            "title": "OK Computer",
            "artist": "Radiohead",
            "format": "LP",
            "date_published": "1997-05-21",
            "image_url": "",
            "genre_tags": ["alt rock", "electronic"]
        }]"#;

        let records: Vec<MediaRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records, vec![ok_computer()]);
        assert_eq!(
            split_genre_tags(&join_genre_tags(&records[0].genre_tags).unwrap()),
            records[0].genre_tags
        );
    }

    #[tokio::test]
    async fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formats.json");
        std::fs::write(&path, r#"[{"name": "LP", "description": "Vinyl record"}]"#).unwrap();

        let records = load_format_records(&path).await.unwrap();
        assert_eq!(records, vec![lp()]);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_format_records(&path).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
