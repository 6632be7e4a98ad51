// Option building - turns user intent into an extractor Configuration

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::errors::DownloadError;
use super::format_selector::QualityTier;
use super::models::{
    AudioCodec, Configuration, MergeFormat, Postprocessor, SubtitleOptions, Verbosity,
};
use super::utils::expand_output_dir;

/// Desktop browser user agents rotated across requests
pub const DESKTOP_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
];

pub const AUDIO_SELECTOR: &str = "bestaudio[ext=m4a]/bestaudio[ext=mp3]/bestaudio/best";

pub const FFMPEG_WARNING: &str =
    "ffmpeg not found on PATH. Embedding/convert features may be disabled.";

const EXTRA_HEADERS: [(&str, &str); 6] = [
    ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    ("Accept-Language", "en-us,en;q=0.5"),
    ("Accept-Encoding", "gzip, deflate"),
    ("DNT", "1"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
];

static UA_CURSOR: AtomicUsize = AtomicUsize::new(0);

fn next_user_agent() -> &'static str {
    let idx = UA_CURSOR.fetch_add(1, Ordering::Relaxed) % DESKTOP_USER_AGENTS.len();
    DESKTOP_USER_AGENTS[idx]
}

/// Audio-only target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTarget {
    pub codec: AudioCodec,
    /// ffmpeg quality, e.g. "192" or "0"
    pub quality: String,
}

impl Default for AudioTarget {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Mp3,
            quality: "192".to_string(),
        }
    }
}

/// What the dashboard user asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadIntent {
    pub quality: QualityTier,
    pub audio: Option<AudioTarget>,
    pub subtitle_langs: Vec<String>,
    /// Overrides the tier when non-empty
    pub custom_format: Option<String>,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    pub write_thumbnail: bool,
    pub playlist: Option<bool>,
}

/// Builds the anti-restriction profile plus the user's choices
#[derive(Debug, Clone, Default)]
pub struct OptionBuilder {
    intent: DownloadIntent,
}

impl OptionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_intent(intent: DownloadIntent) -> Self {
        Self { intent }
    }

    pub fn quality(mut self, quality: QualityTier) -> Self {
        self.intent.quality = quality;
        self
    }

    pub fn audio_only(mut self, codec: AudioCodec, quality: impl Into<String>) -> Self {
        self.intent.audio = Some(AudioTarget {
            codec,
            quality: quality.into(),
        });
        self
    }

    pub fn subtitles(mut self, langs: Vec<String>) -> Self {
        self.intent.subtitle_langs = langs;
        self
    }

    pub fn custom_format(mut self, format: Option<String>) -> Self {
        self.intent.custom_format = format;
        self
    }

    pub fn playlist(mut self, enabled: bool) -> Self {
        self.intent.playlist = Some(enabled);
        self
    }

    pub fn intent(&self) -> &DownloadIntent {
        &self.intent
    }

    /// Final configuration. Creates `output_dir` on the way.
    pub fn build(&self, output_dir: &Path) -> Result<Configuration, DownloadError> {
        std::fs::create_dir_all(output_dir)?;

        let mut config = base_profile(output_dir);
        let intent = &self.intent;

        match &intent.audio {
            Some(target) => {
                config.format = Some(AUDIO_SELECTOR.to_string());
                config.postprocessors.push(Postprocessor::ExtractAudio {
                    codec: target.codec,
                    quality: target.quality.clone(),
                });
            }
            None => {
                let custom = intent
                    .custom_format
                    .as_deref()
                    .map(str::trim)
                    .filter(|f| !f.is_empty());
                config.format = Some(custom.unwrap_or(intent.quality.selector()).to_string());
            }
        }

        if !intent.subtitle_langs.is_empty() {
            config.subtitles = Some(SubtitleOptions {
                languages: intent.subtitle_langs.clone(),
                automatic: true,
            });
        }

        if intent.embed_metadata {
            config.postprocessors.push(Postprocessor::EmbedMetadata);
        }
        if intent.embed_thumbnail {
            config.postprocessors.push(Postprocessor::EmbedThumbnail);
        }
        config.write_thumbnail = intent.write_thumbnail;
        config.playlist = intent.playlist;

        Ok(config)
    }
}

fn base_profile(output_dir: &Path) -> Configuration {
    let mut config = Configuration::new(output_dir);
    config.user_agent = Some(next_user_agent().to_string());
    config.referer = Some("https://www.youtube.com/".to_string());
    config.sleep_interval = Some(2);
    config.max_sleep_interval = Some(8);
    config.retries = Some(5);
    config.fragment_retries = Some(5);
    config.extractor_retries = Some(5);
    config.file_access_retries = Some(5);
    config.http_chunk_size = Some(10 * 1024 * 1024);
    config.skip_unavailable_fragments = true;
    config.ignore_errors = true;
    config.embed_subtitles = true;
    config.http_headers = EXTRA_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    config
}

/// Command line options, independent of the argument parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub output_dir: PathBuf,
    pub template: String,
    pub format: String,
    pub merge_format: MergeFormat,
    pub audio_only: Option<AudioCodec>,
    pub audio_quality: String,
    pub subtitles: bool,
    pub sub_langs: Vec<String>,
    pub auto_subs: bool,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    pub embed_subs: bool,
    pub write_thumbnail: bool,
    pub cookies: Option<PathBuf>,
    pub proxy: Option<String>,
    pub rate_limit: Option<String>,
    pub retries: u32,
    pub fragment_retries: u32,
    pub concurrent_fragments: u32,
    pub no_check_certificate: bool,
    pub download_archive: Option<PathBuf>,
    pub no_playlist: bool,
    pub yes_playlist: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl CliOptions {
    /// Output directory with `~` expanded
    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_output_dir(&self.output_dir)
    }

    /// Map the flag set onto a Configuration. Creates the output directory.
    pub fn to_configuration(&self) -> Result<Configuration, DownloadError> {
        let output_dir = self.resolved_output_dir();
        std::fs::create_dir_all(&output_dir)?;

        let mut config = Configuration::new(&output_dir);
        config.output_template = self.template.clone();
        config.ignore_errors = true;
        config.skip_unavailable_fragments = true;
        config.retries = Some(self.retries);
        config.fragment_retries = Some(self.fragment_retries);
        config.concurrent_fragments = Some(self.concurrent_fragments);
        config.merge_output_format = Some(self.merge_format);

        config.playlist = if self.no_playlist && !self.yes_playlist {
            Some(false)
        } else if self.yes_playlist {
            Some(true)
        } else {
            None
        };

        config.verbosity = if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        };

        config.rate_limit = self.rate_limit.clone();
        config.cookies = self.cookies.clone();
        config.proxy = self.proxy.clone();
        config.download_archive = self.download_archive.clone();
        config.no_check_certificate = self.no_check_certificate;

        if self.subtitles {
            config.subtitles = Some(SubtitleOptions {
                languages: self.sub_langs.clone(),
                automatic: self.auto_subs,
            });
        }
        config.embed_subtitles = self.embed_subs;

        config.write_thumbnail = self.write_thumbnail;
        if self.embed_thumbnail {
            config.postprocessors.push(Postprocessor::EmbedThumbnail);
        }
        if self.embed_metadata {
            config.postprocessors.push(Postprocessor::EmbedMetadata);
        }

        match self.audio_only {
            Some(codec) => {
                config.format = Some("bestaudio/best".to_string());
                config.postprocessors.push(Postprocessor::ExtractAudio {
                    codec,
                    quality: self.audio_quality.clone(),
                });
                if self.embed_thumbnail {
                    config.postprocessors.push(Postprocessor::ConvertThumbnails {
                        format: "jpg".to_string(),
                    });
                }
            }
            None => config.format = Some(self.format.clone()),
        }

        Ok(config)
    }
}

/// Warning to surface when the configuration wants ffmpeg and it is missing
pub fn ffmpeg_warning(config: &Configuration, ffmpeg_available: bool) -> Option<&'static str> {
    if config.needs_ffmpeg() && !ffmpeg_available {
        Some(FFMPEG_WARNING)
    } else {
        None
    }
}
