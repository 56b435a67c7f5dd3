//! Auto-organize REST endpoints
//!
//! Mounted under /api/organize. Corrections and single-file runs use a child
//! of the shutdown token, so a stopping server abandons them cleanly.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use uuid::Uuid;

use crate::app::AppState;
use crate::services::organize::{
    AutoOrganizeOptions, CorrectionRequest, OrganizationResult, OrganizeError, QueryResult, ResultQuery,
    ScanSummary, SeriesSelection,
};

/// JSON error body returned by every handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub struct ApiError(OrganizeError);

impl From<OrganizeError> for ApiError {
    fn from(error: OrganizeError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrganizeError::ResultNotFound(_) | OrganizeError::SeriesIdNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Organize request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeCorrectionBody {
    /// Existing library series; when absent a new series is created
    pub series_id: Option<Uuid>,
    pub new_series_name: Option<String>,
    pub new_series_year: Option<i32>,
    #[serde(default)]
    pub new_series_provider_ids: BTreeMap<String, String>,
    pub target_folder: Option<PathBuf>,
    pub season_number: i32,
    pub episode_number: i32,
    pub ending_episode_number: Option<i32>,
    #[serde(default)]
    pub remember_correction: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieCorrectionBody {
    pub name: String,
    pub year: Option<i32>,
    pub target_folder: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct OrganizeFileBody {
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearLogResponse {
    pub removed: u64,
}

async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ResultQuery>,
) -> ApiResult<QueryResult<OrganizationResult>> {
    Ok(Json(state.organizer.get_results(query).await?))
}

async fn get_result(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<OrganizationResult> {
    Ok(Json(state.organizer.get_result(id).await?))
}

async fn clear_log(State(state): State<AppState>) -> ApiResult<ClearLogResponse> {
    let removed = state.organizer.clear_log().await?;
    Ok(Json(ClearLogResponse { removed }))
}

async fn delete_original_file(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.organizer.delete_original_file(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn correct_episode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<EpisodeCorrectionBody>,
) -> Response {
    let series = match (body.series_id, body.new_series_name, body.target_folder) {
        (Some(series_id), _, _) => SeriesSelection::Existing(series_id),
        (None, Some(name), Some(target_folder)) if !name.trim().is_empty() => SeriesSelection::New {
            name,
            year: body.new_series_year,
            provider_ids: body.new_series_provider_ids,
            target_folder,
        },
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Either 'seriesId' or 'newSeriesName' with 'targetFolder' must be provided".to_string(),
                }),
            )
                .into_response();
        }
    };

    let request = CorrectionRequest::Episode {
        result_id: id,
        series,
        season: body.season_number,
        episode: body.episode_number,
        ending_episode: body.ending_episode_number,
        remember_correction: body.remember_correction,
    };

    match state
        .organizer
        .organize_with_correction(request, &state.shutdown.child_token())
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn correct_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MovieCorrectionBody>,
) -> ApiResult<OrganizationResult> {
    let request = CorrectionRequest::Movie {
        result_id: id,
        name: body.name,
        year: body.year,
        target_folder: body.target_folder,
    };
    let result = state
        .organizer
        .organize_with_correction(request, &state.shutdown.child_token())
        .await?;
    Ok(Json(result))
}

async fn organize_file(State(state): State<AppState>, Json(body): Json<OrganizeFileBody>) -> ApiResult<OrganizationResult> {
    let result = state
        .organizer
        .organize_file(&body.path, &state.shutdown.child_token())
        .await?;
    Ok(Json(result))
}

async fn scan(State(state): State<AppState>) -> ApiResult<ScanSummary> {
    Ok(Json(state.scanner.run(&state.shutdown.child_token()).await?))
}

async fn get_options(State(state): State<AppState>) -> ApiResult<AutoOrganizeOptions> {
    Ok(Json(state.organizer.options().await?))
}

async fn put_options(
    State(state): State<AppState>,
    Json(options): Json<AutoOrganizeOptions>,
) -> ApiResult<AutoOrganizeOptions> {
    state.organizer.save_options(&options).await?;
    Ok(Json(options))
}

async fn in_progress(State(state): State<AppState>) -> Json<Vec<Uuid>> {
    Json(state.organizer.in_progress_ids())
}

/// Live organizer events and completed library changes.
///
/// Each SSE event is named `organizer` or `library` and carries the JSON
/// payload. Slow clients skip what they missed.
async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let organizer = BroadcastStream::new(state.organizer.subscribe())
        .filter_map(|event| event.ok())
        .filter_map(|event| Event::default().event("organizer").json_data(event).ok());
    let library = BroadcastStream::new(state.monitor.subscribe())
        .filter_map(|change| change.ok())
        .filter_map(|change| Event::default().event("library").json_data(change).ok());

    Sse::new(organizer.merge(library).map(Ok)).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/results", get(list_results).delete(clear_log))
        .route("/results/{id}", get(get_result))
        .route("/results/{id}/file", delete(delete_original_file))
        .route("/results/{id}/episode", post(correct_episode))
        .route("/results/{id}/movie", post(correct_movie))
        .route("/files", post(organize_file))
        .route("/scan", post(scan))
        .route("/options", get(get_options).put(put_options))
        .route("/in-progress", get(in_progress))
        .route("/events", get(events))
}
