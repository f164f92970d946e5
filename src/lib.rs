//! miruro_extractor - Resolve playable video links for every episode of a title
//!
//! This library looks up a title on AniList, visits the watch page of each
//! episode in its own headless browser, pokes the player until a stream URL
//! shows up in the markup and collects the links into a flat report.

mod browser;
mod browser_provisioning;
mod config;
mod episode;
mod media_id;
mod metadata_retrieval;
mod poller;
mod report;
pub mod server;
mod temp;
mod worker_pool;

pub use browser::{BrowserError, BrowserSession, ChromeSessionFactory, SessionFactory};
pub use browser_provisioning::{HEADLESS_SHELL_VERSION, ProvisioningError, ensure_browser_available};
pub use config::{BrowserSettings, ConfigError, ExtractorConfig, WatchUrlStyle, default_config_file};
pub use episode::{EpisodeFailure, EpisodeOrchestrator, EpisodeResult, EpisodeTask};
pub use media_id::{MediaIdError, parse_media_id};
pub use metadata_retrieval::{
    AniListProvider, CoverImage, MediaRecord, MediaTitle, MetadataProvider,
    MetadataRetrievalError, resolve_episode_count,
};
pub use poller::{VideoLinkPoller, VideoLinks, scan_markup};
pub use report::{ReportError, ResolvedEpisode, format_report, report_file_name, write_report};
pub use worker_pool::{WorkerPool, WorkerPoolError};

use std::path::PathBuf;
use thiserror::Error;

/// Progress event emitted during a batch extraction
///
/// Episode events are emitted from worker threads as episodes complete, so
/// their order is not the episode order.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Input resolved to a media id
    Started { media_id: u32 },

    /// Metadata found and episode count decided
    MetadataFetched {
        title: String,
        episode_count: u32,
    },

    /// Episodes handed to the worker pool
    EpisodesQueued { count: u32, workers: usize },

    /// An episode produced a video link
    EpisodeResolved { episode: u32, url: String },

    /// An episode produced no video link
    ///
    /// `exhausted` is set when the page loaded but never exposed a link;
    /// otherwise the session itself failed.
    EpisodeFailed {
        episode: u32,
        reason: String,
        exhausted: bool,
    },

    /// Report file written
    ReportWritten { path: PathBuf, line_count: usize },
}

/// Outcome of a batch extraction
#[derive(Debug, Clone)]
pub struct SeriesReport {
    /// The title's metadata
    pub media: MediaRecord,
    /// Number of episodes that were attempted
    pub episode_count: u32,
    /// Resolved episodes, ordered by episode number
    pub episodes: Vec<ResolvedEpisode>,
    /// Location of the written report file
    pub report_path: PathBuf,
}

/// Top-level error type for extraction runs
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The input did not name a media id
    #[error("Invalid input: {0}")]
    Input(#[from] MediaIdError),

    /// The metadata lookup failed
    #[error("Metadata retrieval error: {0}")]
    MetadataRetrieval(#[from] MetadataRetrievalError),

    /// The metadata source knows no such title
    #[error("Could not fetch anime details for id {0}")]
    MediaNotFound(u32),

    /// The worker pool could not be started
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] WorkerPoolError),

    /// Writing the report failed
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Extracts video links for every episode of a title and writes the report
///
/// The input is resolved to a media id, the title's metadata is fetched and
/// one extraction task per episode (`1..=min(count or default, cap)`) is run
/// on a worker pool of `config.worker_count` threads. Failed episodes are
/// left out of the report; the remaining ones are sorted by episode number
/// and written to `config.output_dir`.
///
/// # Examples
///
/// ```no_run
/// use miruro_extractor::{
///     AniListProvider, ChromeSessionFactory, ExtractorConfig, ProgressEvent, extract_series,
/// };
///
/// let config = ExtractorConfig::default();
/// let provider = AniListProvider::new(&config).unwrap();
/// let sessions = ChromeSessionFactory::new(&config.browser).unwrap();
///
/// let report = extract_series(&config, "21", &provider, &sessions, |event| {
///     if let ProgressEvent::EpisodeResolved { episode, url } = event {
///         println!("Episode {}: {}", episode, url);
///     }
/// })
/// .unwrap();
/// println!("Saved to {}", report.report_path.display());
/// ```
pub fn extract_series<F>(
    config: &ExtractorConfig,
    input: &str,
    provider: &dyn MetadataProvider,
    sessions: &dyn SessionFactory,
    progress_callback: F,
) -> Result<SeriesReport, ExtractorError>
where
    F: Fn(ProgressEvent) + Sync,
{
    let media_id = parse_media_id(input)?;
    progress_callback(ProgressEvent::Started { media_id });

    let media = provider
        .fetch_media(media_id)?
        .ok_or(ExtractorError::MediaNotFound(media_id))?;

    let episode_count = media.episode_count(config.default_episode_count, config.episode_cap);
    progress_callback(ProgressEvent::MetadataFetched {
        title: media.display_title(),
        episode_count,
    });

    let pool = WorkerPool::new(config.worker_count)?;
    let orchestrator = EpisodeOrchestrator::new(config, sessions);

    let tasks: Vec<EpisodeTask> = (1..=episode_count)
        .map(|episode| EpisodeTask { media_id, episode })
        .collect();

    progress_callback(ProgressEvent::EpisodesQueued {
        count: episode_count,
        workers: pool.workers(),
    });

    let results = pool.run_all(tasks, |task| {
        let result = orchestrator.process(task);
        progress_callback(match &result.outcome {
            Ok(url) => ProgressEvent::EpisodeResolved {
                episode: result.episode,
                url: url.clone(),
            },
            Err(failure) => ProgressEvent::EpisodeFailed {
                episode: result.episode,
                reason: failure.to_string(),
                exhausted: matches!(failure, EpisodeFailure::Exhausted { .. }),
            },
        });
        result
    });

    let episodes = collect_resolved(results);
    let report_path = write_report(&config.output_dir, media_id, &episodes)?;

    progress_callback(ProgressEvent::ReportWritten {
        path: report_path.clone(),
        line_count: episodes.len(),
    });

    Ok(SeriesReport {
        media,
        episode_count,
        episodes,
        report_path,
    })
}

/// Extracts the video link of a single episode
pub fn resolve_episode(
    config: &ExtractorConfig,
    sessions: &dyn SessionFactory,
    media_id: u32,
    episode: u32,
) -> EpisodeResult {
    EpisodeOrchestrator::new(config, sessions).process(EpisodeTask { media_id, episode })
}

/// Keeps successful results and orders them by episode number
fn collect_resolved(results: Vec<EpisodeResult>) -> Vec<ResolvedEpisode> {
    let mut episodes: Vec<ResolvedEpisode> = results
        .into_iter()
        .filter_map(|result| {
            result.outcome.ok().map(|url| ResolvedEpisode {
                episode: result.episode,
                url,
            })
        })
        .collect();

    episodes.sort_by_key(|e| e.episode);
    episodes
}
