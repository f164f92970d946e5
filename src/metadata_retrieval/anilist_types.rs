/// AniList API response types for deserialization.
///
/// These structures mirror the GraphQL response envelope returned by
/// https://graphql.anilist.co for a `Media` query.
use serde::Deserialize;

/// The top-level GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub(super) struct AniListResponse {
    /// Query result; `null` when the request failed as a whole
    pub data: Option<AniListData>,
}

/// The `data` object of the envelope.
#[derive(Debug, Deserialize)]
pub(super) struct AniListData {
    /// The requested media; `null` when no title has that id
    #[serde(rename = "Media")]
    pub media: Option<AniListMedia>,
}

/// A single media entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AniListMedia {
    pub id: u32,
    pub title: Option<AniListTitle>,
    /// Episode count (null for airing shows with unknown length)
    pub episodes: Option<u32>,
    pub season: Option<String>,
    pub season_year: Option<u32>,
    pub cover_image: Option<AniListCoverImage>,
    pub banner_image: Option<String>,
    /// Description in HTML format (may be null)
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AniListTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AniListCoverImage {
    pub large: Option<String>,
    pub extra_large: Option<String>,
}
