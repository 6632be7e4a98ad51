// Progress line parsing for yt-dlp --newline output

use regex::Regex;

use crate::downloader::models::DownloadProgress;

lazy_static::lazy_static! {
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\S+(?:\s*\w+/s)?))?(?:\s+ETA\s+(\S+))?(?:\s+\(frag\s+(\d+)/(\d+)\))?"
    ).unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
    static ref EXTRACT_AUDIO_RE: Regex = Regex::new(r"\[ExtractAudio\]\s+Destination:\s+(.+)").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
}

fn short_name(path: &str) -> String {
    let name = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
    name.chars().take(50).collect()
}

/// Parse one yt-dlp output line into a progress update.
///
/// Recognizes lines like:
/// `[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)`
pub fn parse_ytdlp_progress(line: &str) -> Option<DownloadProgress> {
    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        let speed = caps.get(3).map(|m| m.as_str()).unwrap_or("?");
        let eta = caps.get(4).map(|m| m.as_str()).unwrap_or("");
        let frag = caps.get(5).zip(caps.get(6));

        let status = match frag {
            Some((fc, ft)) => format!(
                "{:.1}% of {} @ {} ETA {} (frag {}/{})",
                percent,
                size,
                speed,
                eta,
                fc.as_str(),
                ft.as_str()
            ),
            None if !eta.is_empty() => format!("{:.1}% of {} @ {} ETA {}", percent, size, speed, eta),
            None => format!("{:.1}% of {} @ {}", percent, size, speed),
        };

        return Some(DownloadProgress { percent, status });
    }

    if let Some(caps) = DEST_RE.captures(line) {
        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        return Some(DownloadProgress {
            percent: 0.0,
            status: format!("Starting: {}", short_name(filename)),
        });
    }

    if MERGE_RE.is_match(line) {
        return Some(DownloadProgress {
            percent: 99.0,
            status: "Merging video and audio...".to_string(),
        });
    }

    if let Some(caps) = EXTRACT_AUDIO_RE.captures(line) {
        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        return Some(DownloadProgress {
            percent: 99.0,
            status: format!("Extracting audio: {}", short_name(filename)),
        });
    }

    if ALREADY_RE.is_match(line) {
        return Some(DownloadProgress {
            percent: 100.0,
            status: "File already downloaded".to_string(),
        });
    }

    None
}
