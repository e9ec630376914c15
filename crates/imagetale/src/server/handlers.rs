use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use imagetale_core::pipeline::LogProgress;
use imagetale_core::types::StageTimings;
use imagetale_core::{ImageInput, Pipeline, RunError, RunReport, Stage, StageError};
use serde::Serialize;
use serde_json::{json, Value};

use super::page::INDEX_HTML;

/// Shared server state.
pub struct AppState {
    pub pipeline: Pipeline,
}

pub type SharedState = Arc<AppState>;

// ============================================================================
// Static
// ============================================================================

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// ============================================================================
// Story
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub run_id: String,
    pub image_file: String,
    pub caption: String,
    pub story: String,
    pub story_fallback: bool,
    pub fallback_reason: Option<String>,
    pub audio: AudioPayload,
    pub timings: StageTimings,
}

#[derive(Debug, Serialize)]
pub struct AudioPayload {
    pub content_type: String,
    pub size: usize,
    pub data_url: String,
}

impl From<RunReport> for StoryResponse {
    fn from(report: RunReport) -> Self {
        Self {
            run_id: report.run_id,
            image_file: report.image_file,
            caption: report.caption,
            story: report.narrative.text().to_string(),
            story_fallback: report.narrative.is_fallback(),
            fallback_reason: report.narrative.fallback_reason().map(String::from),
            audio: AudioPayload {
                content_type: report.audio.playback_type().to_string(),
                size: report.audio.len(),
                data_url: report.audio.data_url(),
            },
            timings: report.timings,
        }
    }
}

pub async fn create_story(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<StoryResponse>, ApiError> {
    let (file_name, bytes) = read_image_field(&mut multipart).await?;
    process_upload(&state, file_name, bytes).await.map(Json)
}

/// Pull the `image` field out of the form, ignoring any others.
async fn read_image_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::from)? {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(ApiError::from)?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(ApiError {
        status: StatusCode::BAD_REQUEST,
        stage: Stage::Input,
        message: "Missing multipart field 'image'".to_string(),
    })
}

async fn process_upload(
    state: &AppState,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<StoryResponse, ApiError> {
    tracing::info!("Upload {file_name:?} ({} bytes)", bytes.len());
    let image = ImageInput::from_bytes(file_name, bytes);
    let report = state.pipeline.run(image, &LogProgress).await?;
    Ok(StoryResponse::from(report))
}

// ============================================================================
// Errors
// ============================================================================

/// Error body: `{ "error": { "stage", "message" } }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub stage: Stage,
    pub message: String,
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        Self {
            status: status_for(&err.source),
            stage: err.stage,
            message: err.source.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            stage: Stage::Input,
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "stage": self.stage,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

fn status_for(err: &StageError) -> StatusCode {
    match err {
        StageError::InvalidImage { .. } => StatusCode::BAD_REQUEST,
        StageError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        StageError::Caption { .. }
        | StageError::Story { .. }
        | StageError::Speech { .. }
        | StageError::Unreachable { .. } => StatusCode::BAD_GATEWAY,
        StageError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        StageError::Persist { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
