// Session download history (in memory, lost on restart)

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;

/// How many entries the dashboard shows
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadMode {
    #[serde(rename = "Single Video")]
    SingleVideo,
    #[serde(rename = "Audio Only")]
    AudioOnly,
    #[serde(rename = "Playlist")]
    Playlist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub mode: DownloadMode,
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DownloadHistory {
    entries: Vec<HistoryEntry>,
}

impl DownloadHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, url: &str, mode: DownloadMode, files: Vec<String>) -> &HistoryEntry {
        self.entries.push(HistoryEntry {
            url: url.to_string(),
            mode,
            timestamp: local_timestamp(),
            files,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Newest `n` entries, oldest first
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn local_timestamp() -> String {
    // The local offset cannot always be determined once threads are running
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
