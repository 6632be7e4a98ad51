// Batch runner - one ladder per URL, strictly in input order

use std::fmt;
use std::time::Duration;

use crate::downloader::{AttemptOutcome, Configuration, Destination, Extractor, FallbackDownloader, StatusSink};

/// Pause between two consecutive batch requests
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub url: String,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub total: usize,
    pub results: Vec<BatchItem>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchItem> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} succeeded", self.succeeded, self.total)
    }
}

/// Download every URL, pausing between requests but not after the last one.
/// A failed URL never stops the batch.
pub async fn run_batch<E, D>(
    downloader: &FallbackDownloader<E>,
    urls: &[String],
    config: &Configuration,
    destination_for: D,
    pause: Duration,
    sink: &dyn StatusSink,
) -> BatchSummary
where
    E: Extractor,
    D: Fn(&str) -> Destination,
{
    let mut summary = BatchSummary {
        total: urls.len(),
        ..Default::default()
    };

    for (idx, url) in urls.iter().enumerate() {
        if idx > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        tracing::info!(index = idx + 1, total = urls.len(), "[Batch] {}", url);
        let destination = destination_for(url);
        let outcome = downloader.attempt_download(url, config, &destination, sink).await;

        if outcome.is_success() {
            summary.succeeded += 1;
        } else if let Some(error) = outcome.error() {
            tracing::warn!(url = %url, error = %error, "[Batch] download failed");
        }

        summary.results.push(BatchItem {
            url: url.clone(),
            outcome,
        });
    }

    summary
}
