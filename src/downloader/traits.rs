// Extractor trait definition and status notifications

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{Configuration, DownloadProgress, ExtractedMetadata, VideoInfo};

/// Status notifications produced while a request runs
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// A fallback step is about to run
    StrategyStarted { step: u8, notice: String },
    /// A step failed; `message` is already truncated
    StrategyFailed { step: u8, label: &'static str, message: String },
    Progress(DownloadProgress),
}

/// Receiver for status notifications. Must never block the download.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

/// Sink that only logs
pub struct LogSink;

impl StatusSink for LogSink {
    fn emit(&self, event: StatusEvent) {
        match event {
            StatusEvent::StrategyStarted { step, notice } => {
                tracing::info!(step, "[Downloader] {}", notice);
            }
            StatusEvent::StrategyFailed { step, label, message } => {
                tracing::debug!(step, "[Downloader] {} failed: {}", label, message);
            }
            StatusEvent::Progress(p) => {
                tracing::trace!(percent = p.percent, "[yt-dlp] {}", p.status);
            }
        }
    }
}

/// Trait for extraction primitives
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Download `url` into `config.output_dir` and report what was extracted
    async fn extract_and_download(
        &self,
        url: &str,
        config: &Configuration,
        sink: &dyn StatusSink,
    ) -> Result<ExtractedMetadata, DownloadError>;

    /// Get video information (with formats) without downloading
    async fn inspect(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let _ = url;
        Err(DownloadError::Unknown(format!("{} cannot inspect URLs", self.name())))
    }
}

#[async_trait]
impl<T: Extractor + ?Sized> Extractor for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn extract_and_download(
        &self,
        url: &str,
        config: &Configuration,
        sink: &dyn StatusSink,
    ) -> Result<ExtractedMetadata, DownloadError> {
        (**self).extract_and_download(url, config, sink).await
    }

    async fn inspect(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        (**self).inspect(url).await
    }
}

#[async_trait]
impl<T: Extractor + ?Sized> Extractor for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn extract_and_download(
        &self,
        url: &str,
        config: &Configuration,
        sink: &dyn StatusSink,
    ) -> Result<ExtractedMetadata, DownloadError> {
        (**self).extract_and_download(url, config, sink).await
    }

    async fn inspect(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        (**self).inspect(url).await
    }
}
