// FormatSelector - quality tiers and format listing
//
// Maps a quality tier to an opaque yt-dlp selector and turns the raw format
// list of an info lookup into display-ready groups:
// - video-only, audio-only and combined formats
// - top video formats by height, top audio formats by bitrate
// - human readable sizes

use serde::{Deserialize, Serialize};

use super::models::VideoFormat;

/// Quality tiers offered by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "4K")]
    FourK,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "Best Available")]
    Best,
}

impl QualityTier {
    pub const ALL: [QualityTier; 6] = [
        Self::Best,
        Self::FourK,
        Self::P1440,
        Self::P1080,
        Self::P720,
        Self::P480,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::FourK => "4K",
            Self::P1440 => "1440p",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::Best => "Best Available",
        }
    }

    /// yt-dlp format selector for this tier
    pub fn selector(&self) -> &'static str {
        match self {
            Self::FourK => "bestvideo[height<=2160]+bestaudio/best[height<=2160]/best",
            Self::P1440 => "bestvideo[height<=1440]+bestaudio/best[height<=1440]/best",
            Self::P1080 => "bestvideo[height<=1080]+bestaudio/best[height<=1080]/best",
            Self::P720 => "bestvideo[height<=720]+bestaudio/best[height<=720]/best",
            Self::P480 => "bestvideo[height<=480]+bestaudio/best[height<=480]/best",
            Self::Best => "bestvideo[height<=1080]+bestaudio/best[height<=1080]/bestvideo+bestaudio/best",
        }
    }
}

impl From<&str> for QualityTier {
    /// Unrecognized labels fall back to `Best`
    fn from(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(label.trim()))
            .unwrap_or_default()
    }
}

/// Format list of an info lookup, split by stream content
#[derive(Debug, Clone, Default)]
pub struct FormatGroups {
    pub video_only: Vec<VideoFormat>,
    pub audio_only: Vec<VideoFormat>,
    pub combined: Vec<VideoFormat>,
}

/// Format entry for UI display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub abr: Option<f32>,
    pub filesize: Option<u64>,
    /// e.g. "Format 137 - 1080p - avc1.640028 - 150.3MB"
    pub display: String,
}

/// Dashboard view of a format list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatListing {
    pub video: Vec<FormatOption>,
    pub audio: Vec<FormatOption>,
    pub combined_count: usize,
}

pub struct FormatSelector;

impl FormatSelector {
    pub const TOP_VIDEO: usize = 10;
    pub const TOP_AUDIO: usize = 5;

    /// Split formats into video-only, audio-only and combined
    pub fn group(formats: &[VideoFormat]) -> FormatGroups {
        let mut groups = FormatGroups::default();
        for f in formats {
            match (f.has_video(), f.has_audio()) {
                (true, false) => groups.video_only.push(f.clone()),
                (false, true) => groups.audio_only.push(f.clone()),
                (true, true) => groups.combined.push(f.clone()),
                (false, false) => {}
            }
        }
        groups
    }

    /// Top video-only formats by height and top audio-only formats by bitrate
    pub fn listing(formats: &[VideoFormat]) -> FormatListing {
        let mut groups = Self::group(formats);

        groups
            .video_only
            .sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));
        groups.audio_only.sort_by(|a, b| {
            b.abr
                .unwrap_or(0.0)
                .partial_cmp(&a.abr.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        FormatListing {
            video: groups.video_only.iter().take(Self::TOP_VIDEO).map(Self::option).collect(),
            audio: groups.audio_only.iter().take(Self::TOP_AUDIO).map(Self::option).collect(),
            combined_count: groups.combined.len(),
        }
    }

    fn option(format: &VideoFormat) -> FormatOption {
        FormatOption {
            format_id: format.format_id.clone(),
            ext: format.ext.clone(),
            height: format.height,
            abr: format.abr,
            filesize: format.filesize,
            display: Self::display(format),
        }
    }

    /// One-line description: id, resolution, codec and size
    pub fn display(format: &VideoFormat) -> String {
        let resolution = match (format.height, format.width) {
            (Some(h), _) => format!("{}p", h),
            (None, Some(w)) => format!("{}x?", w),
            (None, None) => "?x?".to_string(),
        };

        let codec = if format.has_video() {
            format.vcodec.clone()
        } else {
            format.acodec.clone()
        }
        .unwrap_or_else(|| "unknown".to_string());
        let codec = if codec.chars().count() > 15 {
            format!("{}...", codec.chars().take(12).collect::<String>())
        } else {
            codec
        };

        format!(
            "Format {} - {} - {} - {}",
            format.format_id,
            resolution,
            codec,
            format_filesize(format.filesize)
        )
    }
}

/// Human readable size with one decimal, "Unknown" when missing
pub fn format_filesize(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes.filter(|b| *b > 0) else {
        return "Unknown".to_string();
    };

    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1}{}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1}TB", size)
}
