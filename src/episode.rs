//! Per-episode extraction
//!
//! One orchestrator call owns one fresh browser session for its whole
//! duration: navigate to the episode's watch page, let it settle, poll for
//! the video link and release the session. Failures never escape as errors;
//! they become an [`EpisodeFailure`] for that episode alone.

use crate::browser::{BrowserError, SessionFactory};
use crate::config::ExtractorConfig;
use crate::poller::VideoLinkPoller;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// One unit of work: a single episode of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeTask {
    pub media_id: u32,
    pub episode: u32,
}

/// Why no link was produced for an episode
#[derive(Debug, Error)]
pub enum EpisodeFailure {
    /// The browser session could not be opened
    #[error("browser launch failed: {0}")]
    Launch(#[source] BrowserError),

    /// The watch page could not be loaded
    #[error("navigation failed: {0}")]
    Navigation(#[source] BrowserError),

    /// The session broke down while polling
    #[error("session failed while polling: {0}")]
    Session(#[source] BrowserError),

    /// No link appeared within the attempt ceiling
    #[error("no video link found after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The worker panicked
    #[error("extraction panicked: {0}")]
    Panicked(String),
}

/// Outcome of one episode task
#[derive(Debug)]
pub struct EpisodeResult {
    pub episode: u32,
    pub outcome: Result<String, EpisodeFailure>,
}

impl EpisodeResult {
    pub fn url(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }
}

/// Runs extraction for single episodes
pub struct EpisodeOrchestrator<'a> {
    config: &'a ExtractorConfig,
    sessions: &'a dyn SessionFactory,
    poller: VideoLinkPoller,
}

impl<'a> EpisodeOrchestrator<'a> {
    pub fn new(config: &'a ExtractorConfig, sessions: &'a dyn SessionFactory) -> Self {
        Self {
            config,
            sessions,
            poller: VideoLinkPoller::from_config(config),
        }
    }

    /// Extracts the video link for one episode
    ///
    /// Always returns a result for `task.episode`; the browser session is
    /// released before this returns, whatever the outcome.
    pub fn process(&self, task: EpisodeTask) -> EpisodeResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.extract(task)))
            .unwrap_or_else(|payload| Err(EpisodeFailure::Panicked(panic_message(&*payload))));

        match &outcome {
            Ok(url) => info!(media_id = task.media_id, episode = task.episode, %url, "episode resolved"),
            Err(failure @ (EpisodeFailure::Launch(_) | EpisodeFailure::Panicked(_))) => {
                error!(media_id = task.media_id, episode = task.episode, error = %failure, "episode failed")
            }
            Err(failure) => {
                warn!(media_id = task.media_id, episode = task.episode, error = %failure, "episode failed")
            }
        }

        EpisodeResult {
            episode: task.episode,
            outcome,
        }
    }

    fn extract(&self, task: EpisodeTask) -> Result<String, EpisodeFailure> {
        let url = self.config.watch_url(task.media_id, task.episode);

        // Dropped on every return path below, which closes the browser
        let session = self.sessions.open_session().map_err(EpisodeFailure::Launch)?;

        session.navigate(&url).map_err(EpisodeFailure::Navigation)?;
        settle(self.config.initial_settle());

        self.poller
            .poll(session.as_ref())
            .map_err(EpisodeFailure::Session)?
            .and_then(|links| links.into_preferred())
            .ok_or(EpisodeFailure::Exhausted {
                attempts: self.poller.attempt_ceiling(),
            })
    }
}

fn settle(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
