pub mod batch;
pub mod config;
pub mod downloader;
pub mod history;
pub mod web;

pub use batch::{run_batch, BatchItem, BatchSummary, DEFAULT_BATCH_PAUSE};
pub use config::WebConfig;
pub use downloader::{
    AttemptOutcome, Configuration, Destination, DownloadError, Extractor, FallbackDownloader,
    StatusEvent, StatusSink, YtDlpCli,
};
pub use history::{DownloadHistory, DownloadMode, HistoryEntry};
