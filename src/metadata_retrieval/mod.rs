/// Data structures and traits for anime metadata retrieval.
///
/// This module provides the media record returned by a metadata source and
/// the trait implemented by metadata providers.
mod anilist;
mod anilist_types;

pub use anilist::AniListProvider;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during metadata retrieval operations.
#[derive(Debug, Error)]
pub enum MetadataRetrievalError {
    /// Request to the metadata provider failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the provider's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

/// Title variants of a media entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

/// Cover artwork URLs in the sizes offered by the metadata source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub large: Option<String>,
    pub extra_large: Option<String>,
}

/// Metadata about one anime title.
///
/// Serialized in the camelCase shape of the upstream API so that service
/// responses look like the source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Numeric media identifier
    pub id: u32,
    /// Title variants
    pub title: MediaTitle,
    /// Number of episodes, if known
    pub episodes: Option<u32>,
    /// Airing season (e.g. "SPRING")
    pub season: Option<String>,
    /// Year of the airing season
    pub season_year: Option<u32>,
    /// Cover artwork
    pub cover_image: CoverImage,
    /// Wide banner artwork
    pub banner_image: Option<String>,
    /// Plain-text description
    pub description: Option<String>,
    /// Genre names
    pub genres: Vec<String>,
}

impl MediaRecord {
    /// Best human readable title: romaji, then English, then native
    pub fn display_title(&self) -> String {
        self.title
            .romaji
            .as_deref()
            .or(self.title.english.as_deref())
            .or(self.title.native.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Anime {}", self.id))
    }

    /// Number of episodes to process for this title
    pub fn episode_count(&self, default: u32, cap: u32) -> u32 {
        resolve_episode_count(self.episodes, default, cap)
    }
}

/// Resolves how many episodes to process
///
/// A missing or zero count falls back to `default`; the result never exceeds
/// `cap`.
pub fn resolve_episode_count(fetched: Option<u32>, default: u32, cap: u32) -> u32 {
    fetched.filter(|&count| count > 0).unwrap_or(default).min(cap)
}

/// Trait for metadata providers that can look up anime by id.
pub trait MetadataProvider: Send + Sync {
    /// Fetches the media record for an identifier.
    ///
    /// # Returns
    ///
    /// `Ok(Some(record))` when the title exists, `Ok(None)` when the source
    /// knows no such title, or an error when the lookup itself failed.
    fn fetch_media(&self, media_id: u32) -> Result<Option<MediaRecord>, MetadataRetrievalError>;
}
