//! MySQL catalog store
//!
//! Every value is bound as a statement parameter. Duplicate-entry errors
//! (MySQL 1062) on media writes are mapped to outcomes instead of errors.
//! Natural-key lookups compare byte-exact, whatever collation an older
//! table was created with.

use crate::db::catalog_store::CatalogStore;
use crate::db::models::{
    split_genre_tags, ArtistId, FormatId, InsertOutcome, MediaDetail, MediaId, NewMedia,
    UpdateOutcome,
};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySqlPool, Row};

/// MySQL error number for a duplicate key entry
const ER_DUP_ENTRY: u16 = 1062;

/// Right-hand side of an exact text comparison against a bound parameter
const EXACT_PARAM: &str = "CAST(? AS CHAR CHARACTER SET utf8mb4) COLLATE utf8mb4_bin";

const MEDIA_DETAIL_SELECT: &str = r#"
    SELECT
        m.id, m.title, m.date_published, m.image_url, m.genre_tags,
        m.artist_id, a.name AS artist_name, m.format_id, f.name AS format_name
    FROM media m
    JOIN artists a ON m.artist_id = a.id
    JOIN formats f ON m.format_id = f.id
"#;

#[derive(Clone)]
pub struct MySqlCatalogStore {
    pool: MySqlPool,
}

impl MySqlCatalogStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// True when the error is a unique-key violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .is_some_and(|e| e.number() == ER_DUP_ENTRY)
        }
        _ => false,
    }
}

fn media_detail_from_row(row: &MySqlRow) -> Result<MediaDetail> {
    let genre_tags: Option<String> = row.try_get("genre_tags")?;

    Ok(MediaDetail {
        id: MediaId(row.try_get("id")?),
        title: row.try_get::<Option<String>, _>("title")?.unwrap_or_default(),
        date_published: row.try_get::<Option<NaiveDate>, _>("date_published")?,
        image_url: row.try_get::<Option<String>, _>("image_url")?.unwrap_or_default(),
        genre_tags: split_genre_tags(genre_tags.as_deref().unwrap_or_default()),
        artist_id: ArtistId(row.try_get("artist_id")?),
        artist: row.try_get::<Option<String>, _>("artist_name")?.unwrap_or_default(),
        format_id: FormatId(row.try_get("format_id")?),
        format: row.try_get::<Option<String>, _>("format_name")?.unwrap_or_default(),
    })
}

#[async_trait]
impl CatalogStore for MySqlCatalogStore {
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<ArtistId>> {
        let sql = format!("SELECT id FROM artists WHERE name = {} ORDER BY id LIMIT 1", EXACT_PARAM);
        let id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id.map(ArtistId))
    }

    async fn insert_artist(&self, name: &str) -> Result<ArtistId> {
        let result = sqlx::query("INSERT INTO artists (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(ArtistId(result.last_insert_id() as i64))
    }

    async fn artist_exists(&self, id: ArtistId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists WHERE id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn find_format_by_name(&self, name: &str) -> Result<Option<FormatId>> {
        let sql = format!("SELECT id FROM formats WHERE name = {} ORDER BY id LIMIT 1", EXACT_PARAM);
        let id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id.map(FormatId))
    }

    async fn find_format(&self, name: &str, description: &str) -> Result<Option<FormatId>> {
        let sql = format!(
            "SELECT id FROM formats WHERE name = {0} AND description = {0} ORDER BY id LIMIT 1",
            EXACT_PARAM
        );
        let id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(name)
            .bind(description)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id.map(FormatId))
    }

    async fn insert_format(&self, name: &str, description: &str) -> Result<FormatId> {
        let result = sqlx::query("INSERT INTO formats (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?;

        Ok(FormatId(result.last_insert_id() as i64))
    }

    async fn format_exists(&self, id: FormatId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM formats WHERE id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn insert_media(&self, media: &NewMedia) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO media (title, date_published, image_url, genre_tags, artist_id, format_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&media.title)
        .bind(media.date_published)
        .bind(&media.image_url)
        .bind(&media.genre_tags)
        .bind(media.artist_id.0)
        .bind(media.format_id.0)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(MediaId(done.last_insert_id() as i64))),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_media(&self) -> Result<Vec<MediaDetail>> {
        let sql = format!("{} ORDER BY m.id", MEDIA_DETAIL_SELECT);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(media_detail_from_row).collect()
    }

    async fn get_media(&self, id: MediaId) -> Result<Option<MediaDetail>> {
        let sql = format!("{} WHERE m.id = ?", MEDIA_DETAIL_SELECT);
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(media_detail_from_row).transpose()
    }

    async fn update_media(&self, id: MediaId, media: &NewMedia) -> Result<UpdateOutcome> {
        // rows_affected() counts changed rows only, so probe for the row first
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media WHERE id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Ok(UpdateOutcome::NotFound);
        }

        let result = sqlx::query(
            r#"
            UPDATE media
            SET title = ?, date_published = ?, image_url = ?, genre_tags = ?, artist_id = ?, format_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&media.title)
        .bind(media.date_published)
        .bind(&media.image_url)
        .bind(&media.genre_tags)
        .bind(media.artist_id.0)
        .bind(media.format_id.0)
        .bind(id.0)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(UpdateOutcome::Updated),
            Err(e) if is_unique_violation(&e) => Ok(UpdateOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_media(&self, id: MediaId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
