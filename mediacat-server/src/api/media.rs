//! Media CRUD endpoints
//!
//! Artist and format may be given by id or by name. Names go through the
//! natural-key resolver: an unknown artist name creates the artist, an
//! unknown format name is rejected.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use mediacat_common::db::models::{
    join_genre_tags, ArtistId, FormatId, InsertOutcome, MediaDetail, MediaId, NewMedia,
    UpdateOutcome,
};
use mediacat_common::db::{CatalogStore, NaturalKeyResolver};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of `POST /media` and `PUT /media/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaRequest {
    pub title: String,
    pub artist_id: Option<ArtistId>,
    /// Artist name, used when `artist_id` is absent
    pub artist: Option<String>,
    pub format_id: Option<FormatId>,
    /// Format name, used when `format_id` is absent
    pub format: Option<String>,
    pub date_published: Option<NaiveDate>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub genre_tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: MediaId,
}

fn parse_media_id(raw: &str) -> ApiResult<MediaId> {
    raw.parse::<i64>()
        .map(MediaId)
        .map_err(|_| ApiError::BadRequest("Invalid media ID".to_string()))
}

fn json_body(body: Result<Json<MediaRequest>, JsonRejection>) -> ApiResult<MediaRequest> {
    body.map(|Json(request)| request)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Turn a request into a storable row, resolving artist and format
async fn resolve_request(state: &AppState, request: MediaRequest) -> ApiResult<NewMedia> {
    let genre_tags = join_genre_tags(&request.genre_tags)?;
    let store = state.store.as_ref();
    let resolver = NaturalKeyResolver::new(store);

    let artist_id = match (request.artist_id, request.artist.as_deref()) {
        (Some(id), _) => {
            if !store.artist_exists(id).await? {
                return Err(ApiError::BadRequest("Artist not found".to_string()));
            }
            id
        }
        (None, Some(name)) => resolver.resolve_artist(name).await?,
        (None, None) => {
            return Err(ApiError::BadRequest("artist_id or artist is required".to_string()));
        }
    };

    let format_id = match (request.format_id, request.format.as_deref()) {
        (Some(id), _) => {
            if !store.format_exists(id).await? {
                return Err(ApiError::BadRequest("Format not found".to_string()));
            }
            id
        }
        (None, Some(name)) => resolver.lookup_format(name).await?,
        (None, None) => {
            return Err(ApiError::BadRequest("format_id or format is required".to_string()));
        }
    };

    Ok(NewMedia {
        title: request.title,
        date_published: request.date_published,
        image_url: request.image_url,
        genre_tags,
        artist_id,
        format_id,
    })
}

/// POST /media
pub async fn create_media(
    State(state): State<AppState>,
    body: Result<Json<MediaRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let media = resolve_request(&state, json_body(body)?).await?;

    match state.store.insert_media(&media).await? {
        InsertOutcome::Inserted(id) => {
            info!("Created media '{}' (id {})", media.title, id);
            Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
        }
        InsertOutcome::Duplicate => Err(ApiError::Conflict(format!(
            "Media '{}' already exists for this artist and format",
            media.title
        ))),
    }
}

/// GET /media
pub async fn list_media(State(state): State<AppState>) -> ApiResult<Json<Vec<MediaDetail>>> {
    Ok(Json(state.store.list_media().await?))
}

/// GET /media/:id
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MediaDetail>> {
    let id = parse_media_id(&id)?;

    state
        .store
        .get_media(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Media not found".to_string()))
}

/// PUT /media/:id
pub async fn update_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<MediaRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let id = parse_media_id(&id)?;
    let media = resolve_request(&state, json_body(body)?).await?;

    match state.store.update_media(id, &media).await? {
        UpdateOutcome::Updated => Ok(StatusCode::OK),
        UpdateOutcome::NotFound => Err(ApiError::NotFound("Media not found".to_string())),
        UpdateOutcome::Duplicate => Err(ApiError::Conflict(format!(
            "Media '{}' already exists for this artist and format",
            media.title
        ))),
    }
}

/// DELETE /media/:id
///
/// Deleting an id that does not exist still answers 204.
pub async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_media_id(&id)?;

    if state.store.delete_media(id).await? {
        info!("Deleted media {}", id);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Build media routes
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/media", get(list_media).post(create_media))
        .route(
            "/media/:id",
            get(get_media).put(update_media).delete(delete_media),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_id() {
        assert_eq!(parse_media_id("42").unwrap(), MediaId(42));
        assert!(matches!(parse_media_id("abc"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_request_accepts_names_or_ids() {
        let by_name: MediaRequest = serde_json::from_str(
            r#"{"title": "Kid A", "artist": "Radiohead", "format": "CD"}"#,
        )
        .unwrap();
        assert_eq!(by_name.artist.as_deref(), Some("Radiohead"));
        assert!(by_name.genre_tags.is_empty());

        let by_id: MediaRequest = serde_json::from_str(
            r#"{"title": "Kid A", "artist_id": 1, "format_id": 2, "date_published": "2000-10-02"}"#,
        )
        .unwrap();
        assert_eq!(by_id.artist_id, Some(ArtistId(1)));
        assert_eq!(by_id.format_id, Some(FormatId(2)));
    }
}
