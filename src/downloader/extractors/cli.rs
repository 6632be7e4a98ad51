// CLI extractor - drives the native `yt-dlp` binary
//
// Every option of a Configuration maps onto a yt-dlp flag. Downloads run with
// `--dump-json --no-simulate` so that the info record of each video is printed
// on stdout while the download itself goes ahead.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use super::progress::parse_ytdlp_progress;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{Configuration, ExtractedMetadata, Postprocessor, VideoFormat, VideoInfo, Verbosity};
use crate::downloader::traits::{Extractor, StatusEvent, StatusSink};
use crate::downloader::utils::{run_output_with_timeout, spawn_error};

/// Env var overriding the yt-dlp binary location
pub const YTDLP_BIN_ENV: &str = "YTDLP_BIN";

const INFO_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const INFO_TIMEOUT_SECS: u64 = 120;

/// Extractor backed by the yt-dlp binary
#[derive(Debug, Clone)]
pub struct YtDlpCli {
    binary: PathBuf,
}

impl YtDlpCli {
    pub fn new() -> Self {
        Self {
            binary: Self::locate(),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `YTDLP_BIN`, then PATH lookup, then the bare name
    pub fn locate() -> PathBuf {
        if let Some(path) = std::env::var_os(YTDLP_BIN_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        which::which("yt-dlp").unwrap_or_else(|_| PathBuf::from("yt-dlp"))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// yt-dlp flags for a configuration (without URL or output-mode flags)
    pub fn to_args(config: &Configuration) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        let mut push = |flag: &str, value: Option<String>| {
            args.push(flag.to_string());
            if let Some(v) = value {
                args.push(v);
            }
        };

        if let Some(format) = &config.format {
            push("-f", Some(format.clone()));
        }
        push("-P", Some(config.output_dir.to_string_lossy().into_owned()));
        push("-o", Some(config.output_template.clone()));
        if let Some(merge) = config.merge_output_format {
            push("--merge-output-format", Some(merge.as_str().to_string()));
        }

        if let Some(ua) = &config.user_agent {
            push("--user-agent", Some(ua.clone()));
        }
        if let Some(referer) = &config.referer {
            push("--referer", Some(referer.clone()));
        }
        for (name, value) in &config.http_headers {
            push("--add-header", Some(format!("{}:{}", name, value)));
        }

        let numeric = [
            ("--retries", config.retries.map(u64::from)),
            ("--fragment-retries", config.fragment_retries.map(u64::from)),
            ("--extractor-retries", config.extractor_retries.map(u64::from)),
            ("--file-access-retries", config.file_access_retries.map(u64::from)),
            ("-N", config.concurrent_fragments.map(u64::from)),
            ("--sleep-interval", config.sleep_interval.map(u64::from)),
            ("--max-sleep-interval", config.max_sleep_interval.map(u64::from)),
            ("--http-chunk-size", config.http_chunk_size),
        ];
        for (flag, value) in numeric {
            if let Some(v) = value {
                push(flag, Some(v.to_string()));
            }
        }

        if config.skip_unavailable_fragments {
            push("--skip-unavailable-fragments", None);
        }
        if config.ignore_errors {
            push("-i", None);
        }

        if let Some(subs) = &config.subtitles {
            push("--write-subs", None);
            if subs.automatic {
                push("--write-auto-subs", None);
            }
            if !subs.languages.is_empty() {
                push("--sub-langs", Some(subs.languages.join(",")));
            }
        }
        if config.embed_subtitles {
            push("--embed-subs", None);
        }
        if config.write_thumbnail {
            push("--write-thumbnail", None);
        }

        if let Some(cookies) = &config.cookies {
            push("--cookies", Some(cookies.to_string_lossy().into_owned()));
        }
        if let Some(proxy) = &config.proxy {
            push("--proxy", Some(proxy.clone()));
        }
        if let Some(rate) = &config.rate_limit {
            push("-r", Some(rate.clone()));
        }
        if config.no_check_certificate {
            push("--no-check-certificates", None);
        }
        if let Some(archive) = &config.download_archive {
            push("--download-archive", Some(archive.to_string_lossy().into_owned()));
        }
        match config.playlist {
            Some(false) => push("--no-playlist", None),
            Some(true) => push("--yes-playlist", None),
            None => {}
        }
        match config.verbosity {
            Verbosity::Quiet => push("-q", None),
            Verbosity::Verbose => push("-v", None),
            Verbosity::Normal => {}
        }

        for pp in &config.postprocessors {
            match pp {
                Postprocessor::ExtractAudio { codec, quality } => {
                    push("-x", None);
                    push("--audio-format", Some(codec.as_str().to_string()));
                    push("--audio-quality", Some(quality.clone()));
                }
                Postprocessor::EmbedMetadata => push("--embed-metadata", None),
                Postprocessor::EmbedThumbnail => push("--embed-thumbnail", None),
                Postprocessor::ConvertThumbnails { format } => {
                    push("--convert-thumbnails", Some(format.clone()))
                }
            }
        }

        args
    }

    /// Full argv for a download run
    pub fn download_args(url: &str, config: &Configuration) -> Vec<String> {
        let mut args: Vec<String> = ["--newline", "--progress", "--dump-json", "--no-simulate"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(Self::to_args(config));
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Read metadata for a URL without downloading it
    pub async fn fetch_info(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let args: Vec<String> = [
            "--dump-single-json",
            "--skip-download",
            "--flat-playlist",
            "--no-warnings",
            "--retries",
            "3",
            "--sleep-requests",
            "1",
            "--user-agent",
            INFO_USER_AGENT,
            "--referer",
            "https://www.youtube.com/",
            "--",
            url,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        tracing::debug!(binary = %self.binary.display(), "[yt-dlp] probing {}", url);
        let output = run_output_with_timeout(&self.binary, &args, INFO_TIMEOUT_SECS).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(url, "[yt-dlp] info lookup failed");
            return Err(DownloadError::from_stderr(&stderr));
        }

        parse_video_info(&output.stdout)
    }
}

impl Default for YtDlpCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold one info record into the running metadata
fn absorb_info_line(line: &str, metadata: &mut ExtractedMetadata) {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(line) else {
        tracing::debug!("[yt-dlp] ignoring non-JSON stdout line");
        return;
    };

    metadata.entries += 1;
    if metadata.entries == 1 {
        metadata.id = json["id"].as_str().map(str::to_string);
        metadata.title = json["title"].as_str().map(str::to_string);
        metadata.uploader = json["uploader"].as_str().map(str::to_string);
    }
}

/// Parse `--dump-single-json` output of a video or a flat playlist
pub fn parse_video_info(stdout: &[u8]) -> Result<VideoInfo, DownloadError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

    let formats = json["formats"]
        .as_array()
        .map(|list| list.iter().map(parse_format).collect())
        .unwrap_or_default();

    let entries = json["entries"]
        .as_array()
        .map(|list| {
            list.iter()
                .map(|e| e["title"].as_str().unwrap_or("Unknown").to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(VideoInfo {
        id: json["id"].as_str().unwrap_or("unknown").to_string(),
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        uploader: json["uploader"]
            .as_str()
            .or_else(|| json["channel"].as_str())
            .unwrap_or("Unknown")
            .to_string(),
        duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u64,
        view_count: json["view_count"].as_u64(),
        thumbnail: json["thumbnail"].as_str().unwrap_or("").to_string(),
        formats,
        entries,
    })
}

fn parse_format(f: &serde_json::Value) -> VideoFormat {
    VideoFormat {
        format_id: f["format_id"].as_str().unwrap_or("").to_string(),
        ext: f["ext"].as_str().unwrap_or("").to_string(),
        width: f["width"].as_u64().map(|w| w as u32),
        height: f["height"].as_u64().map(|h| h as u32),
        vcodec: f["vcodec"].as_str().map(str::to_string),
        acodec: f["acodec"].as_str().map(str::to_string),
        filesize: f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64()),
        abr: f["abr"].as_f64().map(|a| a as f32),
    }
}

/// Non-progress stderr kept for error classification: every `ERROR:` line plus
/// the last few others
#[derive(Debug, Default)]
struct StderrTail {
    errors: Vec<String>,
    recent: VecDeque<String>,
}

impl StderrTail {
    const RECENT_LINES: usize = 20;

    fn push(&mut self, line: String) {
        if line.trim_start().starts_with("ERROR:") {
            self.errors.push(line);
            return;
        }
        if self.recent.len() == Self::RECENT_LINES {
            self.recent.pop_front();
        }
        self.recent.push_back(line);
    }

    fn joined(&self) -> String {
        self.recent
            .iter()
            .chain(self.errors.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Extractor for YtDlpCli {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract_and_download(
        &self,
        url: &str,
        config: &Configuration,
        sink: &dyn StatusSink,
    ) -> Result<ExtractedMetadata, DownloadError> {
        let args = Self::download_args(url, config);
        tracing::debug!("[yt-dlp] {} {}", self.binary.display(), args.join(" "));

        let mut child = TokioCommand::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_done, mut err_done) = (false, false);
        let mut metadata = ExtractedMetadata::default();
        let mut stderr_tail = StderrTail::default();

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => match line? {
                    Some(line) if line.trim_start().starts_with('{') => {
                        absorb_info_line(&line, &mut metadata);
                    }
                    Some(line) => {
                        if let Some(progress) = parse_ytdlp_progress(&line) {
                            sink.emit(StatusEvent::Progress(progress));
                        }
                        tracing::trace!("[yt-dlp] {}", line);
                    }
                    None => out_done = true,
                },
                line = err_lines.next_line(), if !err_done => match line? {
                    Some(line) => match parse_ytdlp_progress(&line) {
                        Some(progress) => sink.emit(StatusEvent::Progress(progress)),
                        None => stderr_tail.push(line),
                    },
                    None => err_done = true,
                },
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let stderr = stderr_tail.joined();
            tracing::debug!(code = ?status.code(), "[yt-dlp] exited with failure");
            return Err(DownloadError::from_stderr(&stderr));
        }

        Ok(metadata)
    }

    async fn inspect(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        self.fetch_info(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{AudioCodec, MergeFormat, SubtitleOptions};

    #[test]
    fn test_stderr_tail_is_bounded_and_keeps_errors() {
        let mut tail = StderrTail::default();
        tail.push("ERROR: [youtube] x: Requested format is not available".to_string());
        for i in 0..500 {
            tail.push(format!("WARNING: noise {}", i));
        }

        assert_eq!(tail.recent.len(), StderrTail::RECENT_LINES);
        let joined = tail.joined();
        assert!(!joined.contains("noise 0\n"));
        assert!(joined.ends_with("ERROR: [youtube] x: Requested format is not available"));
        assert!(matches!(
            DownloadError::from_stderr(&joined),
            DownloadError::FormatUnavailable(_)
        ));
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_minimal_args() {
        let config = Configuration::new("/tmp/out");
        let args = YtDlpCli::to_args(&config);
        assert_eq!(args, vec!["-P", "/tmp/out", "-o", "%(title)s [%(id)s].%(ext)s"]);
    }

    #[test]
    fn test_representative_mapping() {
        let mut config = Configuration::new("/tmp/out").with_format("bestvideo*+bestaudio/best");
        config.merge_output_format = Some(MergeFormat::Mkv);
        config.user_agent = Some("UA".to_string());
        config.http_headers.insert("DNT".to_string(), "1".to_string());
        config.retries = Some(10);
        config.concurrent_fragments = Some(5);
        config.http_chunk_size = Some(10_485_760);
        config.ignore_errors = true;
        config.subtitles = Some(SubtitleOptions {
            languages: vec!["en".to_string(), "de".to_string()],
            automatic: false,
        });
        config.rate_limit = Some("1M".to_string());
        config.playlist = Some(false);
        config.verbosity = Verbosity::Quiet;

        let args = YtDlpCli::to_args(&config);
        assert!(has_pair(&args, "-f", "bestvideo*+bestaudio/best"));
        assert!(has_pair(&args, "--merge-output-format", "mkv"));
        assert!(has_pair(&args, "--user-agent", "UA"));
        assert!(has_pair(&args, "--add-header", "DNT:1"));
        assert!(has_pair(&args, "--retries", "10"));
        assert!(has_pair(&args, "-N", "5"));
        assert!(has_pair(&args, "--http-chunk-size", "10485760"));
        assert!(has_pair(&args, "--sub-langs", "en,de"));
        assert!(has_pair(&args, "-r", "1M"));
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"--write-subs".to_string()));
        assert!(!args.contains(&"--write-auto-subs".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"-q".to_string()));
    }

    #[test]
    fn test_postprocessor_flags() {
        let mut config = Configuration::new("/o");
        config.postprocessors = vec![
            Postprocessor::ExtractAudio {
                codec: AudioCodec::Mp3,
                quality: "192".to_string(),
            },
            Postprocessor::EmbedThumbnail,
            Postprocessor::ConvertThumbnails {
                format: "jpg".to_string(),
            },
        ];
        let args = YtDlpCli::to_args(&config);
        assert!(args.contains(&"-x".to_string()));
        assert!(has_pair(&args, "--audio-format", "mp3"));
        assert!(has_pair(&args, "--audio-quality", "192"));
        assert!(args.contains(&"--embed-thumbnail".to_string()));
        assert!(has_pair(&args, "--convert-thumbnails", "jpg"));
    }

    #[test]
    fn test_download_args_end_with_url() {
        let args = YtDlpCli::download_args("https://example.test/v?x=1", &Configuration::new("/o"));
        assert_eq!(&args[..4], &["--newline", "--progress", "--dump-json", "--no-simulate"]);
        assert_eq!(&args[args.len() - 2..], &["--", "https://example.test/v?x=1"]);
    }

    #[test]
    fn test_absorb_info_lines() {
        let mut metadata = ExtractedMetadata::default();
        absorb_info_line(r#"{"id": "a1", "title": "First", "uploader": "Chan"}"#, &mut metadata);
        absorb_info_line(r#"{"id": "a2", "title": "Second"}"#, &mut metadata);
        absorb_info_line("{not json", &mut metadata);
        assert_eq!(metadata.entries, 2);
        assert_eq!(metadata.id.as_deref(), Some("a1"));
        assert_eq!(metadata.title.as_deref(), Some("First"));
        assert_eq!(metadata.uploader.as_deref(), Some("Chan"));
    }

    #[test]
    fn test_parse_video_info() {
        let json = br#"{
            "id": "abc", "title": "Clip", "uploader": "Someone", "duration": 61.5,
            "view_count": 42, "thumbnail": "https://i.example/t.jpg",
            "formats": [
                {"format_id": "137", "ext": "mp4", "height": 1080, "width": 1920, "vcodec": "avc1", "acodec": "none", "filesize": 1000},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.4, "filesize_approx": 500}
            ]
        }"#;
        let info = parse_video_info(json).unwrap();
        assert_eq!(info.title, "Clip");
        assert_eq!(info.duration_seconds, 61);
        assert_eq!(info.view_count, Some(42));
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[1].filesize, Some(500));
        assert!(info.entries.is_empty());
    }

    #[test]
    fn test_parse_playlist_info() {
        let json = br#"{"id": "PL1", "title": "List", "_type": "playlist",
            "entries": [{"title": "One"}, {"title": "Two"}, {}]}"#;
        let info = parse_video_info(json).unwrap();
        assert_eq!(info.entries, vec!["One", "Two", "Unknown"]);
        assert_eq!(info.uploader, "Unknown");
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(parse_video_info(b"nope"), Err(DownloadError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let cli = YtDlpCli::with_binary("/definitely/not/here/yt-dlp");
        struct Quiet;
        impl StatusSink for Quiet {
            fn emit(&self, _event: StatusEvent) {}
        }
        let err = cli
            .extract_and_download("https://example.test", &Configuration::new("/tmp"), &Quiet)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
