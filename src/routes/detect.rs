//! Detection endpoints: text, image upload and video upload

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::constants::{
    MSG_IMAGE_REQUIRED, MSG_INVALID_JSON, MSG_INVALID_MULTIPART, MSG_VIDEO_REQUIRED,
};
use crate::domain::verdict::Verdict;
use crate::services::error::{DetectError, LogErr};
use crate::services::video::extension_for;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/detect-text", post(detect_text))
        .route("/api/detect-image", post(detect_image))
        .route("/api/detect-video", post(detect_video))
}

#[derive(Debug, Deserialize)]
struct DetectTextRequest {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct DetectionResponse {
    status: &'static str,
    confidence: String,
    raw_confidence: f32,
}

impl From<Verdict> for DetectionResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            status: verdict.label.as_status(),
            confidence: verdict.confidence,
            raw_confidence: verdict.raw,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageDetectionResponse {
    ocr_text: String,
    #[serde(flatten)]
    detection: DetectionResponse,
}

#[derive(Debug, Serialize)]
struct VideoDetectionResponse {
    #[serde(flatten)]
    detection: DetectionResponse,
    checked_frames: usize,
}

/// POST /api/detect-text
async fn detect_text(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DetectTextRequest>, JsonRejection>,
) -> Result<Json<DetectionResponse>, DetectError> {
    let Json(req) = payload.log_invalid("[detect] Invalid text body", MSG_INVALID_JSON)?;
    let text = req.text.unwrap_or_default();

    let verdict = run_blocking(move || state.detector.detect_text(&text)).await?;
    Ok(Json(verdict.into()))
}

/// POST /api/detect-image - multipart field `image`
async fn detect_image(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageDetectionResponse>, DetectError> {
    let multipart = multipart.log_invalid("[detect] Not a multipart upload", MSG_IMAGE_REQUIRED)?;
    let upload = read_file_field(multipart, "image")
        .await?
        .ok_or_else(|| DetectError::InvalidInput(MSG_IMAGE_REQUIRED.to_string()))?;

    tracing::debug!("[detect] Image upload of {} bytes", upload.data.len());

    let detection = run_blocking(move || state.detector.detect_image(&upload.data)).await?;
    Ok(Json(ImageDetectionResponse {
        ocr_text: detection.ocr_text,
        detection: detection.verdict.into(),
    }))
}

/// POST /api/detect-video - multipart field `video`
async fn detect_video(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoDetectionResponse>, DetectError> {
    let multipart = multipart.log_invalid("[detect] Not a multipart upload", MSG_VIDEO_REQUIRED)?;
    let upload = read_file_field(multipart, "video")
        .await?
        .ok_or_else(|| DetectError::InvalidInput(MSG_VIDEO_REQUIRED.to_string()))?;

    let extension = extension_for(upload.content_type.as_deref());
    tracing::debug!(
        "[detect] Video upload of {} bytes ({})",
        upload.data.len(),
        extension
    );

    let report =
        run_blocking(move || state.detector.detect_video(&upload.data, extension)).await?;
    Ok(Json(VideoDetectionResponse {
        detection: report.verdict.into(),
        checked_frames: report.frames_checked,
    }))
}

struct UploadedFile {
    data: Bytes,
    content_type: Option<String>,
}

/// First field named `name`; other fields are skipped
async fn read_file_field(
    mut multipart: Multipart,
    name: &str,
) -> Result<Option<UploadedFile>, DetectError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .log_invalid("[detect] Multipart field error", MSG_INVALID_MULTIPART)?
    {
        if field.name() != Some(name) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .log_invalid("[detect] Failed to read upload", MSG_INVALID_MULTIPART)?;
        return Ok(Some(UploadedFile { data, content_type }));
    }
    Ok(None)
}

/// Detection blocks on OCR, ffmpeg and the model; keep it off the reactor
async fn run_blocking<T, F>(work: F) -> Result<T, DetectError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DetectError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .log_internal("[detect] Blocking task failed")?
}
