// Shared state for the dashboard handlers

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::WebConfig;
use crate::downloader::{DownloadedFile, Extractor, FallbackDownloader};
use crate::history::DownloadHistory;

/// Ladder over whichever extractor the binary was started with
pub type DynDownloader = FallbackDownloader<Box<dyn Extractor>>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<DynDownloader>,
    pub config: Arc<WebConfig>,
    /// `~`-expanded output directory for playlist and batch runs
    pub output_dir: PathBuf,
    pub history: Arc<Mutex<DownloadHistory>>,
    pub results: Arc<Mutex<ResultStore>>,
}

impl AppState {
    pub fn new(extractor: Box<dyn Extractor>, config: WebConfig) -> Self {
        let output_dir = config.resolved_output_dir();
        let results = ResultStore::new(config.max_results);
        Self {
            downloader: Arc::new(FallbackDownloader::new(extractor)),
            config: Arc::new(config),
            output_dir,
            history: Arc::new(Mutex::new(DownloadHistory::new())),
            results: Arc::new(Mutex::new(results)),
        }
    }
}

/// In-memory result sets waiting to be exported. Oldest sets are evicted first.
#[derive(Debug)]
pub struct ResultStore {
    capacity: usize,
    next_id: u64,
    sets: VecDeque<(u64, Vec<DownloadedFile>)>,
}

impl ResultStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: 1,
            sets: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, files: Vec<DownloadedFile>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        while self.sets.len() >= self.capacity {
            if let Some((evicted, _)) = self.sets.pop_front() {
                tracing::debug!(result_id = evicted, "[Results] evicted");
            }
        }
        self.sets.push_back((id, files));
        id
    }

    pub fn file(&self, id: u64, index: usize) -> Option<&DownloadedFile> {
        self.sets
            .iter()
            .find(|(set_id, _)| *set_id == id)
            .and_then(|(_, files)| files.get(index))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
