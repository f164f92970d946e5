//! JSON HTTP service
//!
//! Exposes the metadata lookup and single-episode extraction:
//!
//! - `GET /anime?id=<id>` returns the media record plus an `episodesList`
//! - `GET /watch/<id>/<episode>` returns the episode's `video_url`
//!
//! Errors answer with `{"status": "error", "message": ...}` and a 400, 404 or
//! 500 status. All lookups and browser work run on the blocking thread pool.

use crate::browser::SessionFactory;
use crate::config::ExtractorConfig;
use crate::episode::EpisodeFailure;
use crate::media_id::parse_media_id;
use crate::metadata_retrieval::{MediaRecord, MetadataProvider};
use crate::resolve_episode;
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state of the service
pub struct AppState {
    config: ExtractorConfig,
    provider: Arc<dyn MetadataProvider>,
    sessions: Arc<dyn SessionFactory>,
}

impl AppState {
    pub fn new(
        config: ExtractorConfig,
        provider: Arc<dyn MetadataProvider>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            config,
            provider,
            sessions,
        }
    }
}

/// Error answered as a JSON body with `status: "error"`
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "status": "error", "message": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct AnimeQuery {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnimeBody {
    #[serde(flatten)]
    media: MediaRecord,
    #[serde(rename = "episodesList")]
    episodes_list: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct AnimeResponse {
    status: &'static str,
    anime: AnimeBody,
}

#[derive(Debug, Serialize)]
struct WatchResponse {
    status: &'static str,
    video_url: String,
}

/// Builds the service router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/anime", get(get_anime))
        .route("/watch/{id}/{episode}", get(watch_episode))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `addr` until Ctrl-C or SIGTERM
pub async fn serve<A: ToSocketAddrs>(state: Arc<AppState>, addr: A) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutting down");
}

async fn get_anime(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnimeQuery>,
) -> Result<Json<AnimeResponse>, ApiError> {
    let raw_id = query
        .id
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Missing 'id' parameter"))?;
    let media_id = parse_media_id(raw_id).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let provider = Arc::clone(&state.provider);
    let media = tokio::task::spawn_blocking(move || provider.fetch_media(media_id))
        .await
        .map_err(|e| {
            error!(media_id, error = %e, "metadata task failed");
            ApiError::internal("Internal server error")
        })?
        .map_err(|e| {
            error!(media_id, error = %e, "metadata lookup failed");
            ApiError::internal(format!("Failed to fetch anime details: {}", e))
        })?
        .ok_or_else(|| ApiError::not_found("Anime not found"))?;

    let episode_count =
        media.episode_count(state.config.default_episode_count, state.config.episode_cap);

    Ok(Json(AnimeResponse {
        status: "success",
        anime: AnimeBody {
            media,
            episodes_list: (1..=episode_count).collect(),
        },
    }))
}

async fn watch_episode(
    State(state): State<Arc<AppState>>,
    Path((id, episode)): Path<(String, String)>,
) -> Result<Json<WatchResponse>, ApiError> {
    let media_id =
        parse_positive(&id).ok_or_else(|| ApiError::bad_request("Invalid anime id"))?;
    let episode =
        parse_positive(&episode).ok_or_else(|| ApiError::bad_request("Invalid episode number"))?;

    let task_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        resolve_episode(
            &task_state.config,
            task_state.sessions.as_ref(),
            media_id,
            episode,
        )
    })
    .await
    .map_err(|e| {
        error!(media_id, episode, error = %e, "extraction task failed");
        ApiError::internal("Internal server error")
    })?;

    match result.outcome {
        Ok(video_url) => Ok(Json(WatchResponse {
            status: "success",
            video_url,
        })),
        Err(EpisodeFailure::Launch(_) | EpisodeFailure::Panicked(_)) => Err(ApiError::internal(
            "Browser session could not be started",
        )),
        Err(_) => Err(ApiError::not_found("Video URL not found")),
    }
}

fn parse_positive(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|&n| n > 0)
}
