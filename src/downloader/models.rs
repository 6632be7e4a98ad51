// Common data models for downloader

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default yt-dlp output filename template
pub const DEFAULT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

/// Target codec for audio extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Mp3,
    M4a,
    Opus,
    Wav,
    Flac,
    Aac,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Aac => "aac",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container used when merging separate video and audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
}

impl MergeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
        }
    }
}

/// How chatty the extractor should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Post-download transformation performed by the extractor. Every variant runs through ffmpeg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key")]
pub enum Postprocessor {
    /// Transcode to an audio-only file
    ExtractAudio { codec: AudioCodec, quality: String },
    EmbedMetadata,
    EmbedThumbnail,
    ConvertThumbnails { format: String },
}

/// Subtitle download settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubtitleOptions {
    pub languages: Vec<String>,
    /// Allow auto-generated subtitles
    pub automatic: bool,
}

/// Option set handed to the extractor for one attempt.
///
/// Mirrors the subset of yt-dlp options this crate cares about. `None` means
/// "leave the extractor default alone".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Format selector, passed through untouched
    pub format: Option<String>,
    /// Directory the extractor writes into
    pub output_dir: PathBuf,
    /// Filename template relative to `output_dir`
    pub output_template: String,
    pub merge_output_format: Option<MergeFormat>,

    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub http_headers: BTreeMap<String, String>,

    pub retries: Option<u32>,
    pub fragment_retries: Option<u32>,
    pub extractor_retries: Option<u32>,
    pub file_access_retries: Option<u32>,
    pub concurrent_fragments: Option<u32>,
    /// Seconds to sleep before each download
    pub sleep_interval: Option<u32>,
    pub max_sleep_interval: Option<u32>,
    pub http_chunk_size: Option<u64>,
    pub skip_unavailable_fragments: bool,
    pub ignore_errors: bool,

    pub subtitles: Option<SubtitleOptions>,
    pub embed_subtitles: bool,
    pub write_thumbnail: bool,
    pub postprocessors: Vec<Postprocessor>,

    pub cookies: Option<PathBuf>,
    pub proxy: Option<String>,
    pub rate_limit: Option<String>,
    pub no_check_certificate: bool,
    pub download_archive: Option<PathBuf>,
    /// `Some(false)` forces single-video mode, `Some(true)` forces playlist mode
    pub playlist: Option<bool>,
    pub verbosity: Verbosity,
}

impl Configuration {
    /// Minimal configuration writing into `output_dir` with the default template
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            format: None,
            output_dir: output_dir.into(),
            output_template: DEFAULT_TEMPLATE.to_string(),
            merge_output_format: None,
            user_agent: None,
            referer: None,
            http_headers: BTreeMap::new(),
            retries: None,
            fragment_retries: None,
            extractor_retries: None,
            file_access_retries: None,
            concurrent_fragments: None,
            sleep_interval: None,
            max_sleep_interval: None,
            http_chunk_size: None,
            skip_unavailable_fragments: false,
            ignore_errors: false,
            subtitles: None,
            embed_subtitles: false,
            write_thumbnail: false,
            postprocessors: Vec::new(),
            cookies: None,
            proxy: None,
            rate_limit: None,
            no_check_certificate: false,
            download_archive: None,
            playlist: None,
            verbosity: Verbosity::Normal,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Whether any configured feature depends on ffmpeg
    pub fn needs_ffmpeg(&self) -> bool {
        self.embed_subtitles || !self.postprocessors.is_empty()
    }

    /// Audio transcode descriptors as (codec, quality) pairs
    pub fn audio_extractions(&self) -> impl Iterator<Item = (&AudioCodec, &str)> {
        self.postprocessors.iter().filter_map(|pp| match pp {
            Postprocessor::ExtractAudio { codec, quality } => Some((codec, quality.as_str())),
            _ => None,
        })
    }
}

/// Metadata reported by the extractor after a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    /// Number of info records seen (more than one for playlists)
    pub entries: usize,
}

/// Where successful results end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Read every file into memory
    Memory,
    /// Move every file into this directory
    Directory(PathBuf),
}

impl Destination {
    /// Parent for the per-attempt scratch directory
    pub fn scratch_root(&self) -> PathBuf {
        match self {
            Self::Memory => std::env::temp_dir(),
            Self::Directory(dir) => dir.clone(),
        }
    }
}

/// Bytes of a downloaded file, or where they were written
#[derive(Clone, PartialEq, Eq)]
pub enum FileContent {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(data) => write!(f, "Memory({} bytes)", data.len()),
            Self::Disk(path) => write!(f, "Disk({})", path.display()),
        }
    }
}

/// A media file produced by a successful strategy step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub name: String,
    pub size: u64,
    /// Title reported by the extractor, "Unknown" when missing
    pub title: String,
    /// Extension including the leading dot, e.g. ".mp4"
    pub ext: String,
    pub content: FileContent,
}

impl DownloadedFile {
    pub fn size_mb(&self) -> f64 {
        super::utils::size_mb(self.size)
    }

    /// In-memory bytes, if this file was materialized to memory
    pub fn data(&self) -> Option<&[u8]> {
        match &self.content {
            FileContent::Memory(data) => Some(data),
            FileContent::Disk(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Disk(path) => Some(path),
            FileContent::Memory(_) => None,
        }
    }
}

/// Result of running a download request through the strategy ladder
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success {
        files: Vec<DownloadedFile>,
        metadata: ExtractedMetadata,
        /// 1-based number of the step that succeeded
        step: u8,
    },
    Failure {
        message: String,
    },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn files(&self) -> &[DownloadedFile] {
        match self {
            Self::Success { files, .. } => files,
            Self::Failure { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { message } => Some(message),
            Self::Success { .. } => None,
        }
    }
}

/// Download progress information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: f32,
    pub status: String,
}

/// Video information extracted without downloading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub view_count: Option<u64>,
    pub thumbnail: String,
    pub formats: Vec<VideoFormat>,
    /// Titles of playlist entries, empty for single videos
    pub entries: Vec<String>,
}

/// Video format details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    /// Audio bitrate in kbps
    pub abr: Option<f32>,
}

impl VideoFormat {
    fn has_codec(codec: &Option<String>) -> bool {
        codec.as_deref().map_or(false, |c| c != "none" && !c.is_empty())
    }

    pub fn has_video(&self) -> bool {
        Self::has_codec(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        Self::has_codec(&self.acodec)
    }
}
