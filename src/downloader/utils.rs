// Helper functions shared by the extractor, the ladder and the front-ends

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

use crate::downloader::errors::DownloadError;

/// Extensions (without the dot) that count as downloaded media
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mp3", "m4a", "wav", "flac", "opus", "aac"];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "flac", "opus", "aac"];

/// Run command with timeout and collect its output
pub async fn run_output_with_timeout(
    program: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program.display())))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program.display())))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = join_reader(stdout_task).await?;
            let stderr = join_reader(stderr_task).await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::NetworkTimeout(format!(
                "{} timed out after {}s",
                program.display(),
                timeout_secs
            )))
        }
    }
}

async fn join_reader(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExecutionError(format!("reader task failed: {}", e)))?
        .map_err(DownloadError::from)
}

/// Map a spawn failure, keeping "binary missing" distinct from other I/O errors
pub fn spawn_error(program: &Path, e: std::io::Error) -> DownloadError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(format!("{} not found", program.display()))
    } else {
        DownloadError::ExecutionError(format!("Failed to start {}: {}", program.display(), e))
    }
}

/// Cut `message` to `max_chars` characters and mark the cut with "..."
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    let mut short: String = message.chars().take(max_chars).collect();
    short.push_str("...");
    short
}

/// Whether a path has one of the media extensions (case-insensitive)
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MEDIA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Media files directly inside `dir`, ordered by file name
pub fn list_media_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_media_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Media files anywhere below `dir`, ordered by path
pub fn list_media_files_recursive(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && is_media_file(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// MIME type used when exporting a file with this extension
pub fn mime_for_extension(ext: &str) -> &'static str {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        "video/mp4"
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        "audio/mpeg"
    } else {
        "application/octet-stream"
    }
}

/// Size in MiB rounded to two decimals
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

/// URLs from batch-file text: one per line, blank lines and `#` comments skipped
pub fn parse_url_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_urls_from_file(path: &Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_url_lines(&text))
}

/// Batch-file URLs first, then positional ones, deduplicated in first-seen order
pub fn collect_urls(from_file: Vec<String>, positional: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    from_file
        .into_iter()
        .chain(positional)
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

/// Expand a leading `~` to the home directory
pub fn expand_output_dir(raw: &Path) -> PathBuf {
    let Ok(rest) = raw.strip_prefix("~") else {
        return raw.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => raw.to_path_buf(),
    }
}
