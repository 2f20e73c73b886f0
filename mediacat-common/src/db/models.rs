//! Database models

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used for the stored `genre_tags` column
pub const GENRE_TAG_DELIMITER: char = ',';

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

surrogate_id!(
    /// Surrogate key of an `artists` row
    ArtistId
);
surrogate_id!(
    /// Surrogate key of a `formats` row
    FormatId
);
surrogate_id!(
    /// Surrogate key of a `media` row
    MediaId
);

/// Join the tag list into its stored representation
///
/// Tags are stored verbatim. A tag containing the delimiter, or an empty
/// tag, could not be recovered by [`split_genre_tags`], so it is rejected.
pub fn join_genre_tags(tags: &[String]) -> Result<String> {
    if tags.iter().any(String::is_empty) {
        return Err(Error::InvalidInput("genre tags must not be empty".to_string()));
    }
    if let Some(bad) = tags.iter().find(|t| t.contains(GENRE_TAG_DELIMITER)) {
        return Err(Error::InvalidInput(format!(
            "genre tag '{}' contains the '{}' delimiter",
            bad, GENRE_TAG_DELIMITER
        )));
    }

    Ok(tags.join(&GENRE_TAG_DELIMITER.to_string()))
}

/// Split the stored column back into the ordered tag list
///
/// An empty column is an empty list.
pub fn split_genre_tags(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    stored.split(GENRE_TAG_DELIMITER).map(str::to_string).collect()
}

/// Media row ready for insertion: keys resolved, tags joined
#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub title: String,
    pub date_published: Option<NaiveDate>,
    pub image_url: String,
    /// Stored (delimited) representation
    pub genre_tags: String,
    pub artist_id: ArtistId,
    pub format_id: FormatId,
}

/// Media row joined with its artist and format names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDetail {
    pub id: MediaId,
    pub title: String,
    pub date_published: Option<NaiveDate>,
    pub image_url: String,
    pub genre_tags: Vec<String>,
    pub artist_id: ArtistId,
    pub artist: String,
    pub format_id: FormatId,
    pub format: String,
}

/// Result of inserting a media row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(MediaId),
    /// Rejected by the (title, artist_id, format_id) unique key
    Duplicate,
}

/// Result of updating a media row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_join_and_split_preserve_order() {
        let stored = join_genre_tags(&tags(&["alt rock", "electronic"])).unwrap();
        assert_eq!(stored, "alt rock,electronic");
        assert_eq!(split_genre_tags(&stored), tags(&["alt rock", "electronic"]));
    }

    #[test]
    fn test_tags_are_not_normalized() {
        let stored = join_genre_tags(&tags(&[" jazz ", "Jazz"])).unwrap();
        assert_eq!(split_genre_tags(&stored), tags(&[" jazz ", "Jazz"]));
    }

    #[test]
    fn test_empty_tag_list() {
        assert_eq!(join_genre_tags(&[]).unwrap(), "");
        assert!(split_genre_tags("").is_empty());
    }

    #[test]
    fn test_tag_with_delimiter_is_rejected() {
        let err = join_genre_tags(&tags(&["rock,pop"])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_tag_is_rejected() {
        let err = join_genre_tags(&tags(&[""])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = join_genre_tags(&tags(&["rock", ""])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        assert_eq!(serde_json::to_string(&ArtistId(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<MediaId>("42").unwrap(), MediaId(42));
        assert_eq!(FormatId(3).to_string(), "3");
    }
}
