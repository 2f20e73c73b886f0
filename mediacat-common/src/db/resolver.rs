//! Natural-key resolution
//!
//! Maps human-readable keys to surrogate ids:
//! - artists are open-ended and created on first sight
//! - formats are a closed vocabulary: the format import creates them, media
//!   import only looks them up and fails on a miss
//!
//! Keys are matched verbatim. No trimming or case folding happens, so `""`
//! and `"  "` are distinct, valid artist names.
//!
//! The lookup-then-insert sequence is not atomic. It relies on a single
//! writer during bootstrap.

use crate::db::catalog_store::CatalogStore;
use crate::db::models::{ArtistId, FormatId};
use crate::{Error, Result};
use tracing::debug;

/// Resolved id, and whether this call created the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<T> {
    pub id: T,
    pub created: bool,
}

pub struct NaturalKeyResolver<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CatalogStore + ?Sized> NaturalKeyResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Artist id for `name`, creating the artist on a miss
    pub async fn resolve_artist(&self, name: &str) -> Result<ArtistId> {
        Ok(self.ensure_artist(name).await?.id)
    }

    pub async fn ensure_artist(&self, name: &str) -> Result<Resolved<ArtistId>> {
        if let Some(id) = self.store.find_artist_by_name(name).await? {
            return Ok(Resolved { id, created: false });
        }

        let id = self.store.insert_artist(name).await?;
        debug!("Created artist '{}' (id {})", name, id);
        Ok(Resolved { id, created: true })
    }

    /// Format id for the (name, description) pair, creating it on a miss
    ///
    /// A different description for an existing name creates a second row;
    /// an existing row is never updated.
    pub async fn resolve_format(&self, name: &str, description: &str) -> Result<FormatId> {
        Ok(self.ensure_format(name, description).await?.id)
    }

    pub async fn ensure_format(&self, name: &str, description: &str) -> Result<Resolved<FormatId>> {
        if let Some(id) = self.store.find_format(name, description).await? {
            return Ok(Resolved { id, created: false });
        }

        let id = self.store.insert_format(name, description).await?;
        debug!("Created format '{}' (id {})", name, id);
        Ok(Resolved { id, created: true })
    }

    /// Format id for `name`; a missing format is a [`Error::Resolution`]
    pub async fn lookup_format(&self, name: &str) -> Result<FormatId> {
        self.store.find_format_by_name(name).await?.ok_or_else(|| {
            Error::Resolution(format!(
                "referenced format '{}' does not exist; import formats before media",
                name
            ))
        })
    }
}
