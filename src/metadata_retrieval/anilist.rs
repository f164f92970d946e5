/// AniList metadata provider implementation.
use super::anilist_types::{AniListMedia, AniListResponse};
use super::{CoverImage, MediaRecord, MediaTitle, MetadataProvider, MetadataRetrievalError};
use crate::config::ExtractorConfig;
use serde_json::json;
use tracing::debug;

/// GraphQL query for a single anime by id
const MEDIA_QUERY: &str = r#"
query ($id: Int) {
  Media(id: $id, type: ANIME) {
    id
    title { romaji english native }
    episodes
    season
    seasonYear
    coverImage { large extraLarge }
    bannerImage
    description
    genres
  }
}
"#;

/// Metadata provider for the AniList GraphQL API.
pub struct AniListProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl AniListProvider {
    /// Creates a provider for the endpoint and timeout in `config`.
    ///
    /// The blocking client must be created outside of an async runtime.
    pub fn new(config: &ExtractorConfig) -> Result<Self, MetadataRetrievalError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("miruro-extractor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.anilist_endpoint.clone(),
        })
    }

    /// Converts an AniList media entry to our internal MediaRecord structure.
    fn convert_media(media: AniListMedia) -> MediaRecord {
        let title = media
            .title
            .map(|t| MediaTitle {
                romaji: t.romaji,
                english: t.english,
                native: t.native,
            })
            .unwrap_or_default();

        let cover_image = media
            .cover_image
            .map(|c| CoverImage {
                large: c.large,
                extra_large: c.extra_large,
            })
            .unwrap_or_default();

        MediaRecord {
            id: media.id,
            title,
            episodes: media.episodes,
            season: media.season,
            season_year: media.season_year,
            cover_image,
            banner_image: media.banner_image,
            description: media
                .description
                .map(|d| nanohtml2text::html2text(&d).trim().to_string())
                .filter(|d| !d.is_empty()),
            genres: media.genres,
        }
    }

    /// Extracts the media record from a decoded response envelope.
    fn media_from_envelope(envelope: AniListResponse) -> Option<MediaRecord> {
        envelope
            .data
            .and_then(|data| data.media)
            .map(Self::convert_media)
    }
}

impl MetadataProvider for AniListProvider {
    fn fetch_media(&self, media_id: u32) -> Result<Option<MediaRecord>, MetadataRetrievalError> {
        let body = json!({
            "query": MEDIA_QUERY,
            "variables": { "id": media_id },
        });

        debug!(media_id, endpoint = %self.endpoint, "querying media metadata");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))?;

        // AniList answers unknown ids with 404 and a null Media object
        if response.status() == 404 {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(MetadataRetrievalError::RequestError(format!(
                "HTTP {} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let envelope: AniListResponse = response
            .json()
            .map_err(|e| MetadataRetrievalError::ParseError(e.to_string()))?;

        Ok(Self::media_from_envelope(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    /// Reads one HTTP request and returns its body
    fn read_request_body(stream: &TcpStream) -> String {
        let mut reader = BufReader::new(stream);
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line.is_empty() || line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();
        String::from_utf8(body).unwrap()
    }

    /// Answers a single request with a canned response
    ///
    /// Returns a provider pointed at the server and a handle yielding the
    /// received request body.
    fn answer_once(status: &'static str, body: &'static str) -> (AniListProvider, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request_body(&stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        let config = ExtractorConfig {
            anilist_endpoint: endpoint,
            request_timeout_ms: 5_000,
            ..ExtractorConfig::default()
        };
        (AniListProvider::new(&config).unwrap(), handle)
    }

    #[test]
    fn test_fetch_media_success_sends_graphql_body() {
        let (provider, server) = answer_once(
            "200 OK",
            r#"{"data": {"Media": {"id": 21, "title": {"romaji": "ONE PIECE"}, "episodes": 12}}}"#,
        );

        let media = provider.fetch_media(21).unwrap().unwrap();
        assert_eq!(media.id, 21);
        assert_eq!(media.episodes, Some(12));
        assert_eq!(media.display_title(), "ONE PIECE");

        let request: Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(request["variables"]["id"], 21);
        assert!(request["query"].as_str().unwrap().contains("Media(id: $id, type: ANIME)"));
    }

    #[test]
    fn test_fetch_media_not_found_is_absence() {
        let (provider, server) = answer_once(
            "404 Not Found",
            r#"{"errors": [{"message": "Not Found.", "status": 404}], "data": {"Media": null}}"#,
        );

        assert!(provider.fetch_media(404).unwrap().is_none());
        server.join().unwrap();
    }

    #[test]
    fn test_fetch_media_server_error() {
        let (provider, server) = answer_once("500 Internal Server Error", r#"{"errors": []}"#);

        match provider.fetch_media(21) {
            Err(MetadataRetrievalError::RequestError(message)) => {
                assert_eq!(message, "HTTP 500 Internal Server Error")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_fetch_media_malformed_json() {
        let (provider, server) = answer_once("200 OK", "<html>maintenance</html>");

        assert!(matches!(
            provider.fetch_media(21),
            Err(MetadataRetrievalError::ParseError(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_converts_full_envelope() {
        let envelope: AniListResponse = serde_json::from_str(
            r#"{
                "data": {
                    "Media": {
                        "id": 21,
                        "title": {"romaji": "ONE PIECE", "english": "ONE PIECE", "native": "ONE PIECE"},
                        "episodes": null,
                        "season": "FALL",
                        "seasonYear": 1999,
                        "coverImage": {"large": "https://img/large.jpg", "extraLarge": "https://img/xl.jpg"},
                        "bannerImage": "https://img/banner.jpg",
                        "description": "Gold Roger was known as the <i>Pirate King</i>.<br>",
                        "genres": ["Action", "Adventure"]
                    }
                }
            }"#,
        )
        .unwrap();

        let media = AniListProvider::media_from_envelope(envelope).unwrap();
        assert_eq!(media.id, 21);
        assert_eq!(media.episodes, None);
        assert_eq!(media.season_year, Some(1999));
        assert_eq!(media.cover_image.extra_large.as_deref(), Some("https://img/xl.jpg"));
        assert_eq!(media.genres, vec!["Action", "Adventure"]);

        let description = media.description.unwrap();
        assert!(description.contains("Pirate King"));
        assert!(!description.contains("<i>"));
    }

    #[test]
    fn test_missing_media_is_absence() {
        let envelope: AniListResponse =
            serde_json::from_str(r#"{"data": {"Media": null}}"#).unwrap();
        assert!(AniListProvider::media_from_envelope(envelope).is_none());

        let envelope: AniListResponse = serde_json::from_str(
            r#"{"errors": [{"message": "Not Found.", "status": 404}], "data": null}"#,
        )
        .unwrap();
        assert!(AniListProvider::media_from_envelope(envelope).is_none());
    }

    #[test]
    fn test_sparse_media_uses_defaults() {
        let envelope: AniListResponse =
            serde_json::from_str(r#"{"data": {"Media": {"id": 5, "episodes": 26}}}"#).unwrap();

        let media = AniListProvider::media_from_envelope(envelope).unwrap();
        assert_eq!(media.episodes, Some(26));
        assert_eq!(media.title, MediaTitle::default());
        assert!(media.genres.is_empty());
        assert_eq!(media.description, None);
    }
}
