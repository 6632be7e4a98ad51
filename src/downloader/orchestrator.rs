// Orchestrator with the four-step fallback ladder

use std::path::Path;

use super::errors::DownloadError;
use super::models::{AttemptOutcome, Configuration, Destination, DownloadedFile, ExtractedMetadata, FileContent};
use super::traits::{Extractor, StatusEvent, StatusSink};
use super::utils::{list_media_files, list_media_files_recursive, truncate_message};

/// Failure messages are cut to this many characters before they are reported
const NOTICE_LIMIT: usize = 100;

pub const MOBILE_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15";
pub const CRAWLER_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// One rung of the ladder: a pure rewrite of the primary configuration
pub struct StrategyStep {
    pub number: u8,
    pub label: &'static str,
    /// Announced before the step runs (never for the first step)
    pub notice: Option<&'static str>,
    pub transform: fn(&Configuration) -> Configuration,
}

pub const STRATEGY_STEPS: [StrategyStep; 4] = [
    StrategyStep {
        number: 1,
        label: "Primary download method",
        notice: None,
        transform: primary,
    },
    StrategyStep {
        number: 2,
        label: "Alternative method",
        notice: Some("Trying alternative download method..."),
        transform: simplified_format,
    },
    StrategyStep {
        number: 3,
        label: "Mobile mode",
        notice: Some("Trying mobile compatibility mode..."),
        transform: mobile_compat,
    },
    StrategyStep {
        number: 4,
        label: "Audio-only fallback",
        notice: Some("Trying audio-only fallback..."),
        transform: audio_last_resort,
    },
];

fn primary(config: &Configuration) -> Configuration {
    config.clone()
}

/// Swap the selector for a plain one.
///
/// The `+` test is a plain substring check: any selector that merges streams
/// somewhere falls back to a 720p single-file format, everything else to `best`.
pub fn simplified_format(config: &Configuration) -> Configuration {
    let mut simplified = config.clone();
    simplified.format = config.format.as_deref().map(|f| {
        if f.contains('+') {
            "best[height<=720]".to_string()
        } else {
            "best".to_string()
        }
    });
    simplified
}

/// Fresh configuration keeping file naming and the session settings (proxy,
/// cookies, archive, certificate check, rate limit, playlist scope)
fn bare(config: &Configuration) -> Configuration {
    let mut bare = Configuration::new(config.output_dir.clone());
    bare.output_template = config.output_template.clone();
    bare.proxy = config.proxy.clone();
    bare.cookies = config.cookies.clone();
    bare.download_archive = config.download_archive.clone();
    bare.no_check_certificate = config.no_check_certificate;
    bare.rate_limit = config.rate_limit.clone();
    bare.playlist = config.playlist;
    bare.verbosity = config.verbosity;
    bare
}

pub fn mobile_compat(config: &Configuration) -> Configuration {
    let mut mobile = bare(config);
    mobile.format = Some("best[height<=480]/best".to_string());
    mobile.user_agent = Some(MOBILE_USER_AGENT.to_string());
    mobile.referer = Some("https://m.youtube.com/".to_string());
    mobile.retries = Some(3);
    mobile.sleep_interval = Some(5);
    mobile
}

pub fn audio_last_resort(config: &Configuration) -> Configuration {
    let mut audio = bare(config);
    audio.format = Some("bestaudio/best".to_string());
    audio.user_agent = Some(CRAWLER_USER_AGENT.to_string());
    audio.sleep_interval = Some(3);
    audio
}

/// Runs a request through `STRATEGY_STEPS` until one step yields media
pub struct FallbackDownloader<E> {
    extractor: E,
}

impl<E: Extractor> FallbackDownloader<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub async fn attempt_download(
        &self,
        url: &str,
        primary_config: &Configuration,
        destination: &Destination,
        sink: &dyn StatusSink,
    ) -> AttemptOutcome {
        let mut last_error = String::new();

        for step in STRATEGY_STEPS.iter() {
            if let Some(notice) = step.notice {
                sink.emit(StatusEvent::StrategyStarted {
                    step: step.number,
                    notice: notice.to_string(),
                });
            }

            tracing::debug!(
                step = step.number,
                extractor = self.extractor.name(),
                "[Downloader] Trying {}",
                step.label
            );

            let config = (step.transform)(primary_config);
            match self.run_step(url, config, destination, sink).await {
                Ok((files, metadata)) => {
                    tracing::info!(
                        step = step.number,
                        files = files.len(),
                        "[Downloader] ✓ {} succeeded",
                        step.label
                    );
                    return AttemptOutcome::Success {
                        files,
                        metadata,
                        step: step.number,
                    };
                }
                Err(e) => {
                    let message = e.to_string();
                    let short = truncate_message(&message, NOTICE_LIMIT);
                    tracing::warn!(step = step.number, error = %short, "[Downloader] ✗ {} failed", step.label);
                    sink.emit(StatusEvent::StrategyFailed {
                        step: step.number,
                        label: step.label,
                        message: short,
                    });
                    last_error = message;
                }
            }
        }

        AttemptOutcome::Failure {
            message: format!("All download strategies failed. Last error: {}", last_error),
        }
    }

    /// One isolated attempt. The scratch dir is removed when this returns.
    async fn run_step(
        &self,
        url: &str,
        mut config: Configuration,
        destination: &Destination,
        sink: &dyn StatusSink,
    ) -> Result<(Vec<DownloadedFile>, ExtractedMetadata), DownloadError> {
        let root = destination.scratch_root();
        tokio::fs::create_dir_all(&root).await?;
        let scratch = tempfile::Builder::new()
            .prefix(".ytdl-scratch-")
            .tempdir_in(&root)?;
        config.output_dir = scratch.path().to_path_buf();

        let metadata = self.extractor.extract_and_download(url, &config, sink).await?;

        // Templates may nest into subdirectories; only directory runs keep that layout
        let found = match destination {
            Destination::Memory => list_media_files(scratch.path())?,
            Destination::Directory(_) => list_media_files_recursive(scratch.path())?,
        };
        if found.is_empty() {
            return Err(DownloadError::NoMediaProduced);
        }

        let title = metadata.title.clone().unwrap_or_else(|| "Unknown".to_string());
        let mut files = Vec::with_capacity(found.len());
        for path in &found {
            let relative = path.strip_prefix(scratch.path()).unwrap_or(path);
            match materialize(path, relative, &title, destination).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    roll_back(&files).await;
                    return Err(e);
                }
            }
        }

        Ok((files, metadata))
    }
}

/// Removes what a failed step already moved into the destination
async fn roll_back(moved: &[DownloadedFile]) {
    for path in moved.iter().filter_map(DownloadedFile::path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(error = %e, "[Downloader] could not roll back {}", path.display());
        }
    }
}

async fn materialize(
    path: &Path,
    relative: &Path,
    title: &str,
    destination: &Destination,
) -> Result<DownloadedFile, DownloadError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();
    let size = tokio::fs::metadata(path).await?.len();

    let content = match destination {
        Destination::Memory => FileContent::Memory(tokio::fs::read(path).await?),
        Destination::Directory(dir) => {
            let target = dir.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if let Err(e) = tokio::fs::rename(path, &target).await {
                // Different filesystem, or an existing target the OS refuses to replace
                tracing::debug!(error = %e, "[Downloader] rename failed, copying {}", name);
                tokio::fs::copy(path, &target).await?;
                tokio::fs::remove_file(path).await?;
            }
            FileContent::Disk(target)
        }
    };

    Ok(DownloadedFile {
        name,
        size,
        title: title.to_string(),
        ext,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{Postprocessor, SubtitleOptions};
    use crate::downloader::testing::{RecordingSink, ScriptedExtractor, Step};

    fn primary_config() -> Configuration {
        let mut config = Configuration::new("/unused").with_format("bestvideo[height<=1080]+bestaudio/best");
        config.output_template = "%(id)s.%(ext)s".to_string();
        config.user_agent = Some("desktop".to_string());
        config.retries = Some(5);
        config.subtitles = Some(SubtitleOptions {
            languages: vec!["en".to_string()],
            automatic: true,
        });
        config.postprocessors.push(Postprocessor::EmbedMetadata);
        config
    }

    #[tokio::test]
    async fn test_first_step_success_in_memory() {
        let extractor = ScriptedExtractor::new(vec![Step::produce(&[("video.mp4", 1234)], Some("Clip"))]);
        let downloader = FallbackDownloader::new(extractor);
        let sink = RecordingSink::default();

        let outcome = downloader
            .attempt_download("https://example.test/v", &primary_config(), &Destination::Memory, &sink)
            .await;

        match outcome {
            AttemptOutcome::Success { files, step, metadata } => {
                assert_eq!(step, 1);
                assert_eq!(metadata.title.as_deref(), Some("Clip"));
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "video.mp4");
                assert_eq!(files[0].size, 1234);
                assert_eq!(files[0].ext, ".mp4");
                assert_eq!(files[0].title, "Clip");
                assert_eq!(files[0].data().map(|d| d.len()), Some(1234));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(downloader.extractor().call_count(), 1);
        assert!(sink.notices().is_empty());
    }

    #[tokio::test]
    async fn test_success_stops_the_ladder() {
        let extractor = ScriptedExtractor::new(vec![
            Step::fail("HTTP Error 403: Forbidden"),
            Step::produce(&[("a.webm", 10)], None),
            Step::produce(&[("never.mp4", 10)], None),
        ]);
        let downloader = FallbackDownloader::new(extractor);

        let outcome = downloader
            .attempt_download("u", &primary_config(), &Destination::Memory, &RecordingSink::default())
            .await;

        match outcome {
            AttemptOutcome::Success { step, files, .. } => {
                assert_eq!(step, 2);
                assert_eq!(files[0].name, "a.webm");
                assert_eq!(files[0].title, "Unknown");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(downloader.extractor().call_count(), 2);
    }

    #[tokio::test]
    async fn test_all_steps_fail() {
        let extractor = ScriptedExtractor::new(vec![
            Step::fail("first"),
            Step::fail("second"),
            Step::fail("third"),
            Step::fail("fourth and final"),
        ]);
        let downloader = FallbackDownloader::new(extractor);
        let sink = RecordingSink::default();

        let outcome = downloader
            .attempt_download("u", &primary_config(), &Destination::Memory, &sink)
            .await;

        assert_eq!(downloader.extractor().call_count(), 4);
        assert_eq!(
            outcome.error(),
            Some("All download strategies failed. Last error: fourth and final")
        );
        assert_eq!(sink.failures().len(), 4);
        assert_eq!(sink.failures()[0], "first...");
    }

    #[tokio::test]
    async fn test_failure_notice_is_truncated() {
        let long = "e".repeat(250);
        let extractor = ScriptedExtractor::new(vec![Step::fail(&long), Step::produce(&[("x.mp3", 3)], None)]);
        let downloader = FallbackDownloader::new(extractor);
        let sink = RecordingSink::default();

        downloader
            .attempt_download("u", &primary_config(), &Destination::Memory, &sink)
            .await;

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].chars().count(), 103);
    }

    #[tokio::test]
    async fn test_scratch_dirs_are_isolated_and_removed() {
        let extractor = ScriptedExtractor::new(vec![
            Step::fail_leaving("partial", &["leftover.mp4"]),
            Step::produce(&[("ok.mp4", 5)], None),
        ]);
        let downloader = FallbackDownloader::new(extractor);

        let outcome = downloader
            .attempt_download("u", &primary_config(), &Destination::Memory, &RecordingSink::default())
            .await;

        assert!(outcome.is_success());
        let dirs = downloader.extractor().output_dirs();
        assert_eq!(dirs.len(), 2);
        assert_ne!(dirs[0], dirs[1]);
        assert!(!dirs[0].exists());
        assert!(!dirs[1].exists());
        // step 1 leftovers never leak into the result
        assert_eq!(outcome.files().len(), 1);
        assert_eq!(outcome.files()[0].name, "ok.mp4");
    }

    #[tokio::test]
    async fn test_zero_files_is_step_failure() {
        let extractor = ScriptedExtractor::new(vec![
            Step::produce(&[("subs.en.vtt", 4), ("cover.jpg", 4)], None),
            Step::produce(&[("real.m4a", 8)], None),
        ]);
        let downloader = FallbackDownloader::new(extractor);
        let sink = RecordingSink::default();

        let outcome = downloader
            .attempt_download("u", &primary_config(), &Destination::Memory, &sink)
            .await;

        match outcome {
            AttemptOutcome::Success { step, files, .. } => {
                assert_eq!(step, 2);
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].ext, ".m4a");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sink.failures(), vec!["No media files produced...".to_string()]);
    }

    #[tokio::test]
    async fn test_directory_destination_moves_files() {
        let out = tempfile::tempdir().unwrap();
        let extractor = ScriptedExtractor::new(vec![Step::produce(&[("b.mp4", 7), ("a.mp3", 3)], Some("T"))]);
        let downloader = FallbackDownloader::new(extractor);

        let destination = Destination::Directory(out.path().to_path_buf());
        let outcome = downloader
            .attempt_download("u", &primary_config(), &destination, &RecordingSink::default())
            .await;

        let files = outcome.files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.mp3");
        assert_eq!(files[1].path(), Some(out.path().join("b.mp4").as_path()));
        assert_eq!(std::fs::metadata(out.path().join("b.mp4")).unwrap().len(), 7);

        let leftovers: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".ytdl-scratch-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_notices_before_later_steps_only() {
        let extractor = ScriptedExtractor::new(vec![
            Step::fail("one"),
            Step::fail("two"),
            Step::produce(&[("clip.webm", 20)], None),
        ]);
        let downloader = FallbackDownloader::new(extractor);
        let sink = RecordingSink::default();

        downloader
            .attempt_download("u", &primary_config(), &Destination::Memory, &sink)
            .await;

        assert_eq!(
            sink.notices(),
            vec![
                (2, "Trying alternative download method...".to_string()),
                (3, "Trying mobile compatibility mode...".to_string()),
            ]
        );
    }

    #[test]
    fn test_simplified_format_heuristic() {
        let merged = simplified_format(&primary_config());
        assert_eq!(merged.format.as_deref(), Some("best[height<=720]"));

        let single = simplified_format(&Configuration::new("/o").with_format("worst"));
        assert_eq!(single.format.as_deref(), Some("best"));

        let none = simplified_format(&Configuration::new("/o"));
        assert_eq!(none.format, None);
    }

    #[test]
    fn test_simplified_format_keeps_everything_else() {
        let original = primary_config();
        let simplified = simplified_format(&original);
        assert_eq!(simplified.subtitles, original.subtitles);
        assert_eq!(simplified.postprocessors, original.postprocessors);
        assert_eq!(simplified.user_agent, original.user_agent);
        assert_eq!(simplified.retries, original.retries);
    }

    #[test]
    fn test_late_steps_keep_template_and_session() {
        let mut original = primary_config();
        original.proxy = Some("socks5://127.0.0.1:1080".to_string());
        original.download_archive = Some("/var/lib/ytdl/archive.txt".into());
        original.cookies = Some("/home/u/cookies.txt".into());
        original.rate_limit = Some("2M".to_string());
        original.no_check_certificate = true;
        original.playlist = Some(false);

        for late in [mobile_compat(&original), audio_last_resort(&original)] {
            assert_eq!(late.proxy, original.proxy);
            assert_eq!(late.download_archive, original.download_archive);
            assert_eq!(late.cookies, original.cookies);
            assert_eq!(late.rate_limit, original.rate_limit);
            assert!(late.no_check_certificate);
            assert_eq!(late.playlist, Some(false));
        }

        let mobile = mobile_compat(&original);
        assert_eq!(mobile.output_template, "%(id)s.%(ext)s");
        assert_eq!(mobile.format.as_deref(), Some("best[height<=480]/best"));
        assert_eq!(mobile.user_agent.as_deref(), Some(MOBILE_USER_AGENT));
        assert_eq!(mobile.referer.as_deref(), Some("https://m.youtube.com/"));
        assert_eq!(mobile.retries, Some(3));
        assert_eq!(mobile.sleep_interval, Some(5));
        assert!(mobile.subtitles.is_none());
        assert!(mobile.postprocessors.is_empty());

        let audio = audio_last_resort(&original);
        assert_eq!(audio.output_template, "%(id)s.%(ext)s");
        assert_eq!(audio.format.as_deref(), Some("bestaudio/best"));
        assert_eq!(audio.user_agent.as_deref(), Some(CRAWLER_USER_AGENT));
        assert_eq!(audio.sleep_interval, Some(3));
        assert_eq!(audio.retries, None);
        assert!(audio.postprocessors.is_empty());
    }

    #[tokio::test]
    async fn test_every_step_sees_proxy_and_archive() {
        let mut config = primary_config();
        config.proxy = Some("http://proxy.local:3128".to_string());
        config.download_archive = Some("/tmp/archive.txt".into());
        let extractor = ScriptedExtractor::new(vec![
            Step::fail("one"),
            Step::fail("two"),
            Step::fail("three"),
            Step::fail("four"),
        ]);
        let downloader = FallbackDownloader::new(extractor);

        downloader
            .attempt_download("u", &config, &Destination::Memory, &RecordingSink::default())
            .await;

        let seen = downloader.extractor().configs();
        assert_eq!(seen.len(), 4);
        for step in &seen {
            assert_eq!(step.proxy.as_deref(), Some("http://proxy.local:3128"));
            assert_eq!(step.download_archive, config.download_archive);
        }
    }

    #[tokio::test]
    async fn test_nested_template_lands_under_destination() {
        let out = tempfile::tempdir().unwrap();
        let extractor = ScriptedExtractor::new(vec![Step::produce(
            &[("Channel/Season 1/ep.mkv", 9), ("top.mp3", 4)],
            Some("Ep"),
        )]);
        let downloader = FallbackDownloader::new(extractor);
        let mut config = primary_config();
        config.output_template = "%(uploader)s/%(playlist)s/%(title)s.%(ext)s".to_string();

        let destination = Destination::Directory(out.path().to_path_buf());
        let outcome = downloader
            .attempt_download("u", &config, &destination, &RecordingSink::default())
            .await;

        match outcome {
            AttemptOutcome::Success { step, files, .. } => {
                assert_eq!(step, 1);
                assert_eq!(files.len(), 2);
                let nested = out.path().join("Channel").join("Season 1").join("ep.mkv");
                assert_eq!(files[0].name, "ep.mkv");
                assert_eq!(files[0].path(), Some(nested.as_path()));
                assert_eq!(std::fs::metadata(&nested).unwrap().len(), 9);
                assert!(out.path().join("top.mp3").exists());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_move_rolls_back_earlier_files() {
        let out = tempfile::tempdir().unwrap();
        // a non-empty directory where the second file should go makes that move fail
        std::fs::create_dir_all(out.path().join("b.mp4").join("inside")).unwrap();
        let extractor = ScriptedExtractor::new(vec![Step::produce(&[("a.mp4", 5), ("b.mp4", 6)], None)]);
        let downloader = FallbackDownloader::new(extractor);

        let destination = Destination::Directory(out.path().to_path_buf());
        let outcome = downloader
            .attempt_download("u", &primary_config(), &destination, &RecordingSink::default())
            .await;

        assert!(!outcome.is_success());
        assert!(!out.path().join("a.mp4").exists());
        assert!(out.path().join("b.mp4").join("inside").is_dir());
    }
}
