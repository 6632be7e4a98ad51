// Downloader module - option building, extraction and the fallback ladder

pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod options;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::DownloadError;
pub use extractors::YtDlpCli;
pub use format_selector::{FormatSelector, QualityTier};
pub use models::{
    AttemptOutcome, AudioCodec, Configuration, Destination, DownloadProgress, DownloadedFile,
    ExtractedMetadata, FileContent, MergeFormat, Postprocessor, VideoFormat, VideoInfo,
};
pub use options::{CliOptions, DownloadIntent, OptionBuilder};
pub use orchestrator::{FallbackDownloader, STRATEGY_STEPS};
pub use tools::{ToolManager, ToolType};
pub use traits::{Extractor, LogSink, StatusEvent, StatusSink};
