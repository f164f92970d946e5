//! Video link polling
//!
//! Watch pages load their player asynchronously and only emit the stream URL
//! into the DOM after user interaction. The poller simulates that interaction
//! with a keypress, waits, and scans the rendered markup, up to a fixed number
//! of attempts.

use crate::browser::{BrowserError, BrowserSession};
use crate::config::ExtractorConfig;
use regex::Regex;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;
use tracing::debug;

static M3U8_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+\.m3u8"#).expect("static regex"));

static MP4_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+\.mp4"#).expect("static regex"));

/// Stream URLs found in one markup snapshot; at least one is present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLinks {
    pub m3u8: Option<String>,
    pub mp4: Option<String>,
}

impl VideoLinks {
    /// The link to report: mp4 when present, otherwise m3u8
    pub fn preferred(&self) -> Option<&str> {
        self.mp4.as_deref().or(self.m3u8.as_deref())
    }

    pub fn into_preferred(self) -> Option<String> {
        self.mp4.or(self.m3u8)
    }
}

/// Scans markup for the first `.m3u8` and the first `.mp4` URL
pub fn scan_markup(markup: &str) -> Option<VideoLinks> {
    let m3u8 = M3U8_URL.find(markup).map(|m| m.as_str().to_string());
    let mp4 = MP4_URL.find(markup).map(|m| m.as_str().to_string());

    if m3u8.is_none() && mp4.is_none() {
        return None;
    }

    Some(VideoLinks { m3u8, mp4 })
}

/// Bounded keypress-and-scan loop
#[derive(Debug, Clone)]
pub struct VideoLinkPoller {
    attempt_ceiling: u32,
    interval: Duration,
    trigger_key: String,
}

impl VideoLinkPoller {
    pub fn new(attempt_ceiling: u32, interval: Duration, trigger_key: impl Into<String>) -> Self {
        Self {
            attempt_ceiling,
            interval,
            trigger_key: trigger_key.into(),
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(
            config.attempt_ceiling,
            config.poll_interval(),
            config.trigger_key.clone(),
        )
    }

    pub fn attempt_ceiling(&self) -> u32 {
        self.attempt_ceiling
    }

    /// Polls the session until a video link shows up
    ///
    /// Returns `Ok(None)` when the attempt ceiling is reached without a
    /// match. Failed key presses do not end an attempt; failing to read the
    /// markup does, since the session is then unusable.
    pub fn poll(&self, session: &dyn BrowserSession) -> Result<Option<VideoLinks>, BrowserError> {
        for attempt in 1..=self.attempt_ceiling {
            if let Err(e) = session.dispatch_key(&self.trigger_key) {
                debug!(attempt, error = %e, "key press failed");
            }

            thread::sleep(self.interval);

            let markup = session.current_markup()?;
            if let Some(links) = scan_markup(&markup) {
                debug!(attempt, ?links, "video link found");
                return Ok(Some(links));
            }

            debug!(attempt, ceiling = self.attempt_ceiling, "no video link yet");
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SessionFactory;
    use crate::browser::scripted::{Script, ScriptedFactory, loading_markup, player_markup};

    const PAGE: &str = "https://watch.test/1/episode-1";

    fn poller(attempts: u32) -> VideoLinkPoller {
        VideoLinkPoller::new(attempts, Duration::ZERO, "k")
    }

    #[test]
    fn test_scan_finds_m3u8_only() {
        let markup = player_markup(&["https://cdn.test/hls/master.m3u8"]);
        let links = scan_markup(&markup).unwrap();
        assert_eq!(links.m3u8.as_deref(), Some("https://cdn.test/hls/master.m3u8"));
        assert_eq!(links.mp4, None);
        assert_eq!(links.preferred(), Some("https://cdn.test/hls/master.m3u8"));
    }

    #[test]
    fn test_scan_prefers_mp4() {
        let markup = player_markup(&[
            "https://cdn.test/hls/master.m3u8",
            "http://cdn.test/files/episode.mp4",
        ]);
        let links = scan_markup(&markup).unwrap();
        assert_eq!(links.preferred(), Some("http://cdn.test/files/episode.mp4"));
        assert_eq!(
            links.into_preferred().as_deref(),
            Some("http://cdn.test/files/episode.mp4")
        );
    }

    #[test]
    fn test_scan_stops_at_delimiters() {
        let markup = r#"<script>var src='https://cdn.test/a b.mp4'; load("https://cdn.test/ok/ep.m3u8")</script>"#;
        let links = scan_markup(markup).unwrap();
        // The space breaks the first candidate, leaving no mp4 match
        assert_eq!(links.mp4, None);
        assert_eq!(links.m3u8.as_deref(), Some("https://cdn.test/ok/ep.m3u8"));
    }

    #[test]
    fn test_scan_returns_first_match() {
        let markup = player_markup(&[
            "https://cdn.test/one.m3u8",
            "https://cdn.test/two.m3u8",
        ]);
        let links = scan_markup(&markup).unwrap();
        assert_eq!(links.m3u8.as_deref(), Some("https://cdn.test/one.m3u8"));
    }

    #[test]
    fn test_scan_ignores_pages_without_streams() {
        assert_eq!(scan_markup(&loading_markup()), None);
        assert_eq!(scan_markup("ftp://cdn.test/file.mp4"), None);
    }

    #[test]
    fn test_poll_succeeds_after_some_attempts() {
        let factory = ScriptedFactory::new().with_page(
            PAGE,
            Script::Snapshots(vec![
                loading_markup(),
                loading_markup(),
                player_markup(&["https://cdn.test/ep1.m3u8"]),
            ]),
        );
        let session = factory.open_session().unwrap();
        session.navigate(PAGE).unwrap();

        let links = poller(25).poll(session.as_ref()).unwrap().unwrap();
        assert_eq!(links.preferred(), Some("https://cdn.test/ep1.m3u8"));
        assert_eq!(factory.log.key_presses(), 3);
        assert_eq!(factory.log.markup_reads(), 3);
    }

    #[test]
    fn test_poll_exhaustion_is_not_an_error() {
        let factory =
            ScriptedFactory::new().with_page(PAGE, Script::Snapshots(vec![loading_markup()]));
        let session = factory.open_session().unwrap();
        session.navigate(PAGE).unwrap();

        let result = poller(4).poll(session.as_ref()).unwrap();
        assert_eq!(result, None);
        assert_eq!(factory.log.markup_reads(), 4);
    }

    #[test]
    fn test_poll_tolerates_failed_key_presses() {
        let factory = ScriptedFactory::new().with_page(
            PAGE,
            Script::KeysFail(vec![
                loading_markup(),
                player_markup(&["https://cdn.test/ep1.mp4"]),
            ]),
        );
        let session = factory.open_session().unwrap();
        session.navigate(PAGE).unwrap();

        let links = poller(5).poll(session.as_ref()).unwrap().unwrap();
        assert_eq!(links.mp4.as_deref(), Some("https://cdn.test/ep1.mp4"));
        assert_eq!(factory.log.key_presses(), 2);
    }

    #[test]
    fn test_poll_propagates_session_crash() {
        let factory = ScriptedFactory::new().with_page(PAGE, Script::CrashOnRead);
        let session = factory.open_session().unwrap();
        session.navigate(PAGE).unwrap();

        let result = poller(5).poll(session.as_ref());
        assert!(matches!(result, Err(BrowserError::ContentUnavailable(_))));
        assert_eq!(factory.log.markup_reads(), 1);
    }
}
