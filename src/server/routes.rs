//! HTTP router and REST endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Error;
use crate::extractor::MediaExtractor;
use crate::media::{select_best_format, MediaFormat, MediaInfo};
use crate::server::registry::ConnectionRegistry;
use crate::server::ws::ws_download_handler;
use crate::session::DownloadManager;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DownloadManager>,
    pub registry: Arc<ConnectionRegistry>,
    pub extractor: Arc<dyn MediaExtractor>,
    pub config: Arc<Config>,
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let mut router = Router::new()
        .route("/api/video/info", get(video_info))
        .route("/api/video/formats", get(video_formats))
        .route("/api/video/best-format", get(video_best_format))
        .route("/api/status", get(service_status))
        .route("/ws/download", get(ws_download_handler))
        .nest_service(
            "/downloads",
            ServeDir::new(state.config.download_directory()),
        );

    if let Some(static_dir) = &state.config.server.static_directory {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if parsed.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[derive(Debug, Deserialize)]
struct VideoQuery {
    url: String,
    #[serde(default)]
    prefer_quality: Option<String>,
}

/// GET /api/video/info?url=...
async fn video_info(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<MediaInfo>, ApiError> {
    let info = state.extractor.fetch_info(&query.url).await?;
    Ok(Json(info))
}

/// GET /api/video/formats?url=...
async fn video_formats(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<Vec<MediaFormat>>, ApiError> {
    let info = state.extractor.fetch_info(&query.url).await?;
    Ok(Json(info.formats))
}

/// GET /api/video/best-format?url=...&prefer_quality=720p
async fn video_best_format(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<MediaFormat>, ApiError> {
    let info = state.extractor.fetch_info(&query.url).await?;
    let quality = query
        .prefer_quality
        .unwrap_or_else(|| state.config.downloads.preferred_quality.clone());

    select_best_format(&info.formats, &quality)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError(Error::MediaSource("no suitable format found".to_string())))
}

#[derive(Debug, Serialize)]
struct ServiceStatus {
    active_downloads: usize,
    queued_downloads: usize,
    connections: usize,
}

/// GET /api/status
async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        active_downloads: state.manager.active_count(),
        queued_downloads: state.manager.queue_depth(),
        connections: state.registry.connection_count(),
    })
}

/// Adapter mapping crate errors onto HTTP responses.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) | Error::UrlParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::MediaSource(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateSession(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("API request failed: {}", self.0);
        }

        let body = Json(serde_json::json!({
            "error": { "message": self.0.client_message() }
        }));
        (status, body).into_response()
    }
}
