// Error types for the extractor and the strategy ladder

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network timeout while talking to the host
    #[error("Network timeout: the host is not responding ({0})")]
    NetworkTimeout(String),

    /// The host refused the request (403, 429, bot detection, ...)
    #[error("Blocked by host: {0}")]
    BlockedByHost(String),

    /// The format selector matched nothing
    #[error("Requested format is not available: {0}")]
    FormatUnavailable(String),

    /// yt-dlp or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Unsupported or malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// The extractor finished but left no media files behind
    #[error("No media files produced")]
    NoMediaProduced,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown error with details
    #[error("{0}")]
    Unknown(String),
}

impl DownloadError {
    /// Classify raw extractor stderr into an error variant.
    ///
    /// Only the meaningful lines are kept: every `ERROR:` line, or the last
    /// non-empty line when there is none. Classification looks at those lines
    /// alone, so titles and progress output never decide the variant.
    pub fn from_stderr(stderr: &str) -> Self {
        let message = summarize_stderr(stderr);
        let lower = message.to_lowercase();
        let has = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if has(&["timed out", "timeout"]) {
            return Self::NetworkTimeout(message);
        }

        if has(&[
            "http error 403",
            "http error 429",
            "forbidden",
            "too many requests",
            "not a bot",
            "sign in to confirm",
            "blocked",
        ]) {
            return Self::BlockedByHost(message);
        }

        if has(&["requested format is not available"]) {
            return Self::FormatUnavailable(message);
        }

        if has(&["command not found", "no such file"]) {
            return Self::ToolNotFound(message);
        }

        if has(&["unsupported url", "invalid url", "is not a valid url"]) {
            return Self::InvalidUrl(message);
        }

        Self::Unknown(message)
    }
}

impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        Self::from_stderr(&s)
    }
}

fn summarize_stderr(stderr: &str) -> String {
    let error_lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();

    if !error_lines.is_empty() {
        return error_lines.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("yt-dlp exited with an error")
        .to_string()
}
