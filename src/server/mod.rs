use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::audio::AudioFormat;
use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineRequest};
use crate::progress::ProgressStore;
use crate::resolver;
use crate::store::cleanup;
use crate::store::{Transcript, TranscriptStore};
use crate::translate::{ProgressScale, ProviderKind, TranslationRequest, TranslationStage};
use crate::Result;

/// Shared state behind every route handler.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    translation: Arc<TranslationStage>,
    progress: Arc<dyn ProgressStore>,
    transcripts: Arc<TranscriptStore>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        pipeline: Arc<Pipeline>,
        translation: Arc<TranslationStage>,
        progress: Arc<dyn ProgressStore>,
        transcripts: Arc<TranscriptStore>,
    ) -> Self {
        Self {
            pipeline,
            translation,
            progress,
            transcripts,
            config: Arc::new(config),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/transcribe", post(handle_transcribe))
        .route("/api/transcribe/progress", get(handle_progress))
        .route("/api/translate", post(handle_translate_local))
        .route("/api/translate/progress", get(handle_progress))
        .route("/api/translate/google", post(handle_translate_remote))
        .route("/api/cleanup", post(handle_cleanup))
        .route("/api/download", get(handle_download))
        .route("/api/transcripts", get(handle_list_transcripts).post(handle_save_transcript))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server until shutdown.
pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("API listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

// -------------------- Submission & progress --------------------

#[derive(Debug, Deserialize)]
struct TranscribeBody {
    url: Option<String>,
    #[serde(default)]
    options: TranscribeOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeOptions {
    target_language: Option<String>,
    platform_type: Option<String>,
    request_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeResponse {
    success: bool,
    request_id: String,
    video_id: String,
    title: String,
    transcript: String,
    translation: String,
    detected_language: String,
    audio_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_transcribe(
    State(state): State<AppState>,
    Json(body): Json<TranscribeBody>,
) -> Response<TranscribeResponse> {
    let url = match body.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => return Err((StatusCode::BAD_REQUEST, "url is required".to_string())),
    };

    let target_lang = body
        .options
        .target_language
        .unwrap_or_else(|| state.config.translation.default_target_lang.clone());

    let request = PipelineRequest::new(
        &url,
        body.options.platform_type.as_deref(),
        &target_lang,
        body.options.request_id,
    );

    let result = state.pipeline.run(request).await;
    if !result.success {
        // Input errors are the only hard failures the pipeline reports.
        return Err((
            StatusCode::BAD_REQUEST,
            result.error.unwrap_or_else(|| "invalid request".to_string()),
        ));
    }

    Ok(Json(TranscribeResponse {
        success: result.success,
        request_id: result.request_id,
        video_id: result.video_id,
        title: result.title,
        transcript: result.transcript,
        translation: result.translation,
        detected_language: result.detected_language,
        audio_path: result.audio_path,
        error: result.error,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressQuery {
    request_id: String,
}

#[derive(Debug, Serialize)]
struct ProgressResponse {
    progress: u8,
    step: String,
}

async fn handle_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Json<ProgressResponse> {
    let snapshot = state.progress.get(&query.request_id);
    Json(ProgressResponse {
        progress: snapshot.percent,
        step: snapshot.step,
    })
}

// -------------------- Translation --------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateBody {
    text: Option<String>,
    source_lang: Option<String>,
    target_lang: Option<String>,
    request_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateLocalResponse {
    success: bool,
    translation: String,
    source_lang: String,
    target_lang: String,
    #[serde(rename = "usedNLLB")]
    used_nllb: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRemoteResponse {
    success: bool,
    translation: String,
    direction: String,
    source_lang: String,
    target_lang: String,
    used_google: bool,
}

fn translation_request(
    state: &AppState,
    body: TranslateBody,
) -> std::result::Result<TranslationRequest, (StatusCode, String)> {
    let text = match body.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err((StatusCode::BAD_REQUEST, "text is required".to_string())),
    };

    Ok(TranslationRequest {
        text,
        source_lang: body.source_lang.unwrap_or_else(|| "en".to_string()),
        target_lang: body
            .target_lang
            .unwrap_or_else(|| state.config.translation.default_target_lang.clone()),
        request_id: body.request_id.unwrap_or_else(resolver::new_request_id),
    })
}

async fn handle_translate_local(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> Response<TranslateLocalResponse> {
    let request = translation_request(&state, body)?;
    let translated = state
        .translation
        .translate(&request, ProgressScale::full())
        .await;

    Ok(Json(TranslateLocalResponse {
        success: true,
        translation: translated.translation,
        source_lang: request.source_lang,
        target_lang: request.target_lang,
        used_nllb: translated.provider == ProviderKind::Local,
    }))
}

async fn handle_translate_remote(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> Response<TranslateRemoteResponse> {
    let request = translation_request(&state, body)?;
    let translated = state
        .translation
        .translate_remote_only(&request, ProgressScale::full())
        .await;

    Ok(Json(TranslateRemoteResponse {
        success: true,
        translation: translated.translation,
        direction: translated.direction.as_str().to_string(),
        source_lang: request.source_lang,
        target_lang: request.target_lang,
        used_google: translated.provider == ProviderKind::Remote,
    }))
}

// -------------------- Cleanup --------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupBody {
    request_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupResponse {
    deleted_files: usize,
    freed_space: u64,
}

async fn handle_cleanup(
    State(state): State<AppState>,
    Json(body): Json<CleanupBody>,
) -> Response<CleanupResponse> {
    let token = match body.request_id.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => return Err((StatusCode::BAD_REQUEST, "requestId is required".to_string())),
    };

    let work_dir = state.config.work_dir();
    let report = tokio::task::spawn_blocking(move || cleanup::cleanup_request(&work_dir, &token))
        .await
        .unwrap_or_default();

    Ok(Json(CleanupResponse {
        deleted_files: report.deleted_files,
        freed_space: report.freed_bytes,
    }))
}

// -------------------- Audio download --------------------

/// A single silent MPEG frame. Served when the requested audio is missing
/// so the client's player still has something playable to load.
const SILENT_MP3: [u8; 417] = silent_mp3_frame();

const fn silent_mp3_frame() -> [u8; 417] {
    let mut frame = [0u8; 417];
    // 128 kbit/s, 44.1 kHz, mono MPEG-1 Layer III header.
    frame[0] = 0xFF;
    frame[1] = 0xFB;
    frame[2] = 0x90;
    frame[3] = 0x64;
    frame
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    path: Option<String>,
    filename: Option<String>,
}

async fn handle_download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> impl IntoResponse {
    let filename = query.filename.unwrap_or_else(|| "audio.mp3".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        crate::utils::sanitize_filename(&filename)
    );

    let bytes = match query.path.as_deref() {
        Some(path) => read_served_audio(Path::new(path), &state.config.work_dir()).await,
        None => None,
    };

    match bytes {
        Some((bytes, content_type)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        ),
        None => {
            tracing::warn!("Requested audio missing, serving silent fallback");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "audio/mpeg".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                SILENT_MP3.to_vec(),
            )
        }
    }
}

/// Read an audio file for serving, refusing paths outside the work dir.
async fn read_served_audio(path: &Path, work_dir: &Path) -> Option<(Vec<u8>, String)> {
    let canonical = tokio::fs::canonicalize(path).await.ok()?;
    let work_dir = tokio::fs::canonicalize(work_dir).await.ok()?;
    if !canonical.starts_with(&work_dir) {
        tracing::warn!(
            "Refusing to serve {} from outside {}",
            canonical.display(),
            work_dir.display()
        );
        return None;
    }

    let bytes = tokio::fs::read(&canonical).await.ok()?;
    let content_type = canonical
        .extension()
        .and_then(|ext| AudioFormat::from_extension(&ext.to_string_lossy()))
        .map(|format| format.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Some((bytes, content_type))
}

// -------------------- Transcript persistence --------------------

#[derive(Debug, Deserialize)]
struct SaveTranscriptBody {
    transcript: Transcript,
}

async fn handle_save_transcript(
    State(state): State<AppState>,
    Json(body): Json<SaveTranscriptBody>,
) -> Response<serde_json::Value> {
    if body.transcript.id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "transcript.id is required".to_string()));
    }

    // Persistence failures are logged but still acknowledged; the client
    // keeps its local copy either way.
    if let Err(e) = state.transcripts.upsert(&body.transcript) {
        tracing::warn!("Transcript save failed: {:#}", e);
        return Ok(Json(serde_json::json!({ "success": false })));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn handle_list_transcripts(State(state): State<AppState>) -> Json<Vec<Transcript>> {
    let transcripts = state.transcripts.list().unwrap_or_else(|e| {
        tracing::warn!("Transcript list failed: {:#}", e);
        Vec::new()
    });
    Json(transcripts)
}

// -------------------- Health --------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: i64,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

type Response<T> = std::result::Result<Json<T>, (StatusCode, String)>;
