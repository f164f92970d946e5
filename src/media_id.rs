//! Media identifier resolution from free-form user input

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static WATCH_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/watch/(\d+)").expect("static regex"));

static QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=(\d+)").expect("static regex"));

/// Errors for input that does not name a media identifier
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaIdError {
    /// Input was empty
    #[error("No anime ID given")]
    Empty,

    /// Input is neither a number nor a watch URL with an id
    #[error("Could not find an anime ID in '{0}'")]
    Unrecognized(String),

    /// Parsed id was zero or did not fit
    #[error("Invalid anime ID: {0}")]
    OutOfRange(String),
}

/// Resolves a media id from a bare integer or a watch page URL
///
/// Accepted forms:
/// - `123`
/// - `https://www.miruro.to/watch/456` (optionally followed by `/episode-N`)
/// - `https://www.miruro.to/watch?id=456&ep=2`
pub fn parse_media_id(input: &str) -> Result<u32, MediaIdError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(MediaIdError::Empty);
    }

    let digits = if input.chars().all(|c| c.is_ascii_digit()) {
        input
    } else {
        WATCH_PATH_ID
            .captures(input)
            .or_else(|| QUERY_ID.captures(input))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| MediaIdError::Unrecognized(input.to_string()))?
    };

    match digits.parse::<u32>() {
        Ok(0) | Err(_) => Err(MediaIdError::OutOfRange(digits.to_string())),
        Ok(id) => Ok(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_integer() {
        assert_eq!(parse_media_id("123"), Ok(123));
        assert_eq!(parse_media_id("  21\n"), Ok(21));
    }

    #[test]
    fn test_watch_urls() {
        assert_eq!(parse_media_id("https://www.miruro.to/watch/456"), Ok(456));
        assert_eq!(
            parse_media_id("https://www.miruro.to/watch/456/episode-3"),
            Ok(456)
        );
        assert_eq!(
            parse_media_id("https://www.miruro.to/watch?id=789&ep=2"),
            Ok(789)
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert_eq!(parse_media_id(""), Err(MediaIdError::Empty));
        assert!(matches!(
            parse_media_id("one piece"),
            Err(MediaIdError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_media_id("-5"),
            Err(MediaIdError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_media_id("0"),
            Err(MediaIdError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_media_id("99999999999"),
            Err(MediaIdError::OutOfRange(_))
        ));
    }
}
