// Dashboard route handlers

use std::sync::Mutex as StdMutex;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::state::AppState;
use crate::batch::run_batch;
use crate::downloader::options::AudioTarget;
use crate::downloader::utils::{list_media_files, mime_for_extension, size_mb};
use crate::downloader::{
    AttemptOutcome, AudioCodec, DownloadError, DownloadIntent, DownloadedFile, Destination,
    FileContent, FormatSelector, OptionBuilder, QualityTier, StatusEvent, StatusSink, ToolManager,
    ToolType,
};
use crate::history::{DownloadMode, RECENT_LIMIT};

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Choices shared by the single, playlist and batch forms
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub quality: String,
    pub audio_only: bool,
    pub audio_format: Option<AudioCodec>,
    pub subtitle_langs: Vec<String>,
    pub custom_format: Option<String>,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    pub write_thumbnail: bool,
}

impl RequestOptions {
    fn intent(&self, playlist: Option<bool>) -> DownloadIntent {
        DownloadIntent {
            quality: QualityTier::from(self.quality.as_str()),
            audio: self.audio_only.then(|| AudioTarget {
                codec: self.audio_format.unwrap_or_default(),
                ..AudioTarget::default()
            }),
            subtitle_langs: self.subtitle_langs.clone(),
            custom_format: self
                .custom_format
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
            embed_metadata: self.embed_metadata,
            embed_thumbnail: self.embed_thumbnail,
            write_thumbnail: self.write_thumbnail,
            playlist,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub options: RequestOptions,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub urls_text: String,
    #[serde(flatten)]
    pub options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct FileView {
    index: usize,
    name: String,
    size: u64,
    size_mb: f64,
    mime: &'static str,
}

impl FileView {
    fn from_file(index: usize, file: &DownloadedFile) -> Self {
        Self {
            index,
            name: file.name.clone(),
            size: file.size,
            size_mb: file.size_mb(),
            mime: mime_for_extension(&file.ext),
        }
    }
}

/// Collects what the user should see about the ladder's progress
#[derive(Default)]
struct NoticeSink {
    notices: StdMutex<Vec<String>>,
}

impl NoticeSink {
    fn into_notices(self) -> Vec<String> {
        self.notices.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl StatusSink for NoticeSink {
    fn emit(&self, event: StatusEvent) {
        let line = match event {
            StatusEvent::StrategyStarted { notice, .. } => notice,
            StatusEvent::StrategyFailed { label, message, .. } => format!("{} failed: {}", label, message),
            StatusEvent::Progress(p) => {
                tracing::trace!(percent = p.percent, "[Web] {}", p.status);
                return;
            }
        };
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(line);
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({"error": {"code": code, "message": message.into()}})),
    )
        .into_response()
}

fn extraction_error(e: DownloadError) -> Response {
    let status = match e {
        DownloadError::ToolNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
        DownloadError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_response(status, "extraction_failed", e.to_string())
}

fn missing_url() -> Response {
    error_response(StatusCode::BAD_REQUEST, "missing_url", "A URL is required")
}

/// GET / - dashboard page
pub async fn index() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// GET /api/status - output directory and tool availability
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let tools = tokio::task::spawn_blocking(|| ToolManager::new().get_all_tools())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "[Web] tool detection did not finish");
            Vec::new()
        });
    let available = |tool: ToolType| tools.iter().any(|t| t.tool_type == tool && t.is_available);

    Json(json!({
        "output_dir": state.output_dir.to_string_lossy(),
        "ffmpeg_available": available(ToolType::Ffmpeg),
        "ytdlp_available": available(ToolType::YtDlp),
        "tools": tools,
    }))
}

/// POST /api/info - video or playlist details
pub async fn info(State(state): State<AppState>, Json(req): Json<UrlRequest>) -> Response {
    let url = req.url.trim();
    if url.is_empty() {
        return missing_url();
    }

    match state.downloader.extractor().inspect(url).await {
        Ok(info) => {
            let preview: Vec<&String> = info.entries.iter().take(5).collect();
            (
                StatusCode::OK,
                Json(json!({
                    "id": info.id,
                    "title": info.title,
                    "uploader": info.uploader,
                    "duration_seconds": info.duration_seconds,
                    "view_count": info.view_count,
                    "thumbnail": info.thumbnail,
                    "entry_count": info.entries.len(),
                    "entries": preview,
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "[Web] info lookup failed");
            extraction_error(e)
        }
    }
}

/// POST /api/formats - grouped format listing
pub async fn formats(State(state): State<AppState>, Json(req): Json<UrlRequest>) -> Response {
    let url = req.url.trim();
    if url.is_empty() {
        return missing_url();
    }

    match state.downloader.extractor().inspect(url).await {
        Ok(info) => (StatusCode::OK, Json(FormatSelector::listing(&info.formats))).into_response(),
        Err(e) => {
            tracing::warn!(url, error = %e, "[Web] format lookup failed");
            extraction_error(e)
        }
    }
}

/// POST /api/download - single video or audio into memory
pub async fn download(State(state): State<AppState>, Json(req): Json<DownloadRequest>) -> Response {
    let url = req.url.trim();
    if url.is_empty() {
        return missing_url();
    }

    let intent = req.options.intent(None);
    let mode = if intent.audio.is_some() {
        DownloadMode::AudioOnly
    } else {
        DownloadMode::SingleVideo
    };
    let config = match OptionBuilder::from_intent(intent).build(&std::env::temp_dir()) {
        Ok(config) => config,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "config_error", e.to_string()),
    };

    let sink = NoticeSink::default();
    let outcome = state
        .downloader
        .attempt_download(url, &config, &Destination::Memory, &sink)
        .await;
    let notices = sink.into_notices();

    match outcome {
        AttemptOutcome::Success { files, step, .. } => {
            let views: Vec<FileView> = files
                .iter()
                .enumerate()
                .map(|(i, f)| FileView::from_file(i, f))
                .collect();
            let names = files.iter().map(|f| f.name.clone()).collect();

            state.history.lock().await.record(url, mode, names);
            let result_id = state.results.lock().await.insert(files);
            tracing::info!(result_id, step, "[Web] download stored");

            Json(json!({
                "success": true,
                "result_id": result_id,
                "files": views,
                "notices": notices,
                "error": null,
            }))
            .into_response()
        }
        AttemptOutcome::Failure { message } => Json(json!({
            "success": false,
            "result_id": null,
            "files": [],
            "notices": notices,
            "error": message,
        }))
        .into_response(),
    }
}

/// GET /api/results/:id/files/:index - export one stored file
pub async fn export_file(
    State(state): State<AppState>,
    Path((id, index)): Path<(u64, usize)>,
) -> Response {
    let file = state.results.lock().await.file(id, index).cloned();
    let Some(file) = file else {
        return error_response(StatusCode::NOT_FOUND, "not_found", "Result file not found");
    };

    let bytes = match file.content {
        FileContent::Memory(data) => data,
        FileContent::Disk(path) => match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) => return error_response(StatusCode::NOT_FOUND, "not_found", e.to_string()),
        },
    };

    let disposition = format!("attachment; filename=\"{}\"", file.name.replace('"', "'"));
    (
        [
            (header::CONTENT_TYPE, mime_for_extension(&file.ext).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

/// POST /api/playlist - whole playlist into the output directory
pub async fn playlist(State(state): State<AppState>, Json(req): Json<DownloadRequest>) -> Response {
    let url = req.url.trim();
    if url.is_empty() {
        return missing_url();
    }

    let builder = OptionBuilder::from_intent(req.options.intent(Some(true)));
    let config = match builder.build(&state.output_dir) {
        Ok(config) => config,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "config_error", e.to_string()),
    };

    let sink = NoticeSink::default();
    let destination = Destination::Directory(state.output_dir.clone());
    let outcome = state
        .downloader
        .attempt_download(url, &config, &destination, &sink)
        .await;

    if outcome.is_success() {
        let names = outcome.files().iter().map(|f| f.name.clone()).collect();
        state.history.lock().await.record(url, DownloadMode::Playlist, names);
    }

    let files: Vec<FileView> = outcome
        .files()
        .iter()
        .enumerate()
        .map(|(i, f)| FileView::from_file(i, f))
        .collect();
    Json(json!({
        "success": outcome.is_success(),
        "count": files.len(),
        "files": files,
        "notices": sink.into_notices(),
        "error": outcome.error(),
    }))
    .into_response()
}

/// POST /api/batch - one URL per line into the output directory
pub async fn batch(State(state): State<AppState>, Json(req): Json<BatchRequest>) -> Response {
    let urls: Vec<String> = req
        .urls_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no_urls", "No URLs provided");
    }

    let builder = OptionBuilder::from_intent(req.options.intent(None));
    let config = match builder.build(&state.output_dir) {
        Ok(config) => config,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "config_error", e.to_string()),
    };

    let sink = NoticeSink::default();
    let output_dir = state.output_dir.clone();
    let summary = run_batch(
        state.downloader.as_ref(),
        &urls,
        &config,
        |_| Destination::Directory(output_dir.clone()),
        state.config.batch_pause(),
        &sink,
    )
    .await;

    let failed: Vec<_> = summary
        .failed()
        .map(|item| json!({"url": item.url, "error": item.outcome.error()}))
        .collect();
    Json(json!({
        "succeeded": summary.succeeded,
        "total": summary.total,
        "message": summary.to_string(),
        "failed": failed,
    }))
    .into_response()
}

/// GET /api/downloads - media files in the output directory, newest first
pub async fn downloads(State(state): State<AppState>) -> Response {
    let dir = state.output_dir.clone();
    let listing = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<serde_json::Value>> {
        let paths = match list_media_files(&dir) {
            Ok(paths) => paths,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let meta = std::fs::metadata(&path)?;
            let modified = meta.modified().ok();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            entries.push((modified, name, meta.len()));
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(entries
            .into_iter()
            .map(|(_, name, size)| json!({"name": name, "size": size, "size_mb": size_mb(size)}))
            .collect())
    })
    .await;

    match listing {
        Ok(Ok(files)) => Json(json!({"files": files})).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "[Web] failed to list downloads");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "io_error", e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "io_error", e.to_string()),
    }
}

/// GET /api/history - newest entries
pub async fn get_history(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.history.lock().await;
    Json(json!({
        "items": history.recent(RECENT_LIMIT),
        "total": history.len(),
    }))
}

/// DELETE /api/history
pub async fn clear_history(State(state): State<AppState>) -> impl IntoResponse {
    let mut history = state.history.lock().await;
    let cleared = history.len();
    history.clear();
    tracing::info!(cleared, "[Web] history cleared");
    Json(json!({"cleared": cleared}))
}
