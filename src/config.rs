// Web dashboard configuration (flags with environment fallbacks)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::downloader::utils::expand_output_dir;

#[derive(Debug, Clone, Parser)]
#[command(name = "ytdl-pro-web")]
#[command(about = "Web dashboard for downloading videos, playlists and audio through yt-dlp")]
pub struct WebConfig {
    /// Address the dashboard listens on
    #[arg(long, env = "YTDL_PRO_BIND", default_value = "127.0.0.1:8501")]
    pub bind: SocketAddr,

    /// Directory for playlist and batch downloads
    #[arg(long, env = "YTDL_PRO_OUTPUT_DIR", default_value = "./Downloads")]
    pub output_dir: PathBuf,

    /// Pause between batch requests, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub batch_pause_ms: u64,

    /// In-memory result sets kept for export
    #[arg(long, default_value_t = 8)]
    pub max_results: usize,
}

impl WebConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_output_dir(&self.output_dir)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            output_dir: PathBuf::from("./Downloads"),
            batch_pause_ms: 500,
            max_results: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = WebConfig::parse_from([
            "ytdl-pro-web",
            "--bind",
            "0.0.0.0:9000",
            "--output-dir",
            "/srv/media",
            "--batch-pause-ms",
            "0",
            "--max-results",
            "2",
        ]);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.output_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.batch_pause(), Duration::ZERO);
        assert_eq!(config.max_results, 2);
    }

    #[test]
    fn test_default_matches_parser_defaults() {
        let defaults = WebConfig::default();
        assert_eq!(defaults.bind.to_string(), "127.0.0.1:8501");
        assert_eq!(defaults.batch_pause(), Duration::from_millis(500));
        assert_eq!(defaults.max_results, 8);
    }
}
