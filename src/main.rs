use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use ytdl_pro::downloader::models::DEFAULT_TEMPLATE;
use ytdl_pro::downloader::options::ffmpeg_warning;
use ytdl_pro::downloader::utils::{collect_urls, read_urls_from_file};
use ytdl_pro::downloader::{AudioCodec, CliOptions, LogSink, MergeFormat, ToolManager};
use ytdl_pro::{
    run_batch, BatchSummary, Destination, FallbackDownloader, StatusEvent, StatusSink, YtDlpCli,
    DEFAULT_BATCH_PAUSE,
};

/// No URL resolved from the arguments or the batch file
const EXIT_NO_URLS: u8 = 2;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MergeArg {
    Mp4,
    Mkv,
    Webm,
}

impl From<MergeArg> for MergeFormat {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Mp4 => MergeFormat::Mp4,
            MergeArg::Mkv => MergeFormat::Mkv,
            MergeArg::Webm => MergeFormat::Webm,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AudioArg {
    Mp3,
    M4a,
    Opus,
    Wav,
    Flac,
    Aac,
}

impl From<AudioArg> for AudioCodec {
    fn from(arg: AudioArg) -> Self {
        match arg {
            AudioArg::Mp3 => AudioCodec::Mp3,
            AudioArg::M4a => AudioCodec::M4a,
            AudioArg::Opus => AudioCodec::Opus,
            AudioArg::Wav => AudioCodec::Wav,
            AudioArg::Flac => AudioCodec::Flac,
            AudioArg::Aac => AudioCodec::Aac,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ytdl-pro", version)]
#[command(about = "Download videos, playlists or audio, falling back to simpler strategies when blocked")]
struct Cli {
    /// Video or playlist URLs
    urls: Vec<String>,

    /// File with one URL per line ('#' starts a comment)
    #[arg(short = 'a', long)]
    batch_file: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "./Downloads")]
    output_dir: PathBuf,

    /// Output filename template
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    template: String,

    /// Format selector
    #[arg(short, long, default_value = "bestvideo*+bestaudio/best")]
    format: String,

    /// Container for merged video and audio
    #[arg(short, long, value_enum, default_value_t = MergeArg::Mp4)]
    merge_format: MergeArg,

    /// Extract audio only, in this format
    #[arg(short = 'A', long, value_enum)]
    audio_only: Option<AudioArg>,

    /// Audio quality for extraction (0 is best)
    #[arg(long, default_value = "0")]
    audio_quality: String,

    /// Download subtitles
    #[arg(long)]
    subtitles: bool,

    /// Subtitle languages
    #[arg(long, num_args = 1.., default_values_t = vec!["en".to_string()])]
    sub_langs: Vec<String>,

    /// Include automatic subtitles
    #[arg(long)]
    auto_subs: bool,

    #[arg(long)]
    embed_metadata: bool,

    #[arg(long)]
    embed_thumbnail: bool,

    #[arg(long)]
    embed_subs: bool,

    /// Save the thumbnail next to the media file
    #[arg(long)]
    write_thumbnail: bool,

    /// Netscape cookies file
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Proxy URL, e.g. socks5://127.0.0.1:1080
    #[arg(long)]
    proxy: Option<String>,

    /// Download rate limit, e.g. 2M
    #[arg(long)]
    rate_limit: Option<String>,

    #[arg(long, default_value_t = 10)]
    retries: u32,

    #[arg(long, default_value_t = 10)]
    fragment_retries: u32,

    /// Fragments downloaded in parallel
    #[arg(long, default_value_t = 5)]
    concurrent_fragments: u32,

    #[arg(long)]
    no_check_certificate: bool,

    /// Record downloaded IDs here and skip them next time
    #[arg(long)]
    download_archive: Option<PathBuf>,

    /// Download only the video when the URL also names a playlist
    #[arg(long)]
    no_playlist: bool,

    /// Download the whole playlist when the URL names both
    #[arg(long)]
    yes_playlist: bool,

    #[arg(short, long)]
    quiet: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> CliOptions {
        CliOptions {
            output_dir: self.output_dir.clone(),
            template: self.template.clone(),
            format: self.format.clone(),
            merge_format: self.merge_format.into(),
            audio_only: self.audio_only.map(AudioCodec::from),
            audio_quality: self.audio_quality.clone(),
            subtitles: self.subtitles,
            sub_langs: self.sub_langs.clone(),
            auto_subs: self.auto_subs,
            embed_metadata: self.embed_metadata,
            embed_thumbnail: self.embed_thumbnail,
            embed_subs: self.embed_subs,
            write_thumbnail: self.write_thumbnail,
            cookies: self.cookies.clone(),
            proxy: self.proxy.clone(),
            rate_limit: self.rate_limit.clone(),
            retries: self.retries,
            fragment_retries: self.fragment_retries,
            concurrent_fragments: self.concurrent_fragments,
            no_check_certificate: self.no_check_certificate,
            download_archive: self.download_archive.clone(),
            no_playlist: self.no_playlist,
            yes_playlist: self.yes_playlist,
            quiet: self.quiet,
            verbose: self.verbose,
        }
    }

    /// Batch-file URLs first, then positional ones
    fn resolve_urls(&self) -> anyhow::Result<Vec<String>> {
        let from_file = match &self.batch_file {
            Some(path) => read_urls_from_file(path)
                .with_context(|| format!("Failed to read batch file {}", path.display()))?,
            None => Vec::new(),
        };
        Ok(collect_urls(from_file, self.urls.clone()))
    }

    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// Spinner that shows yt-dlp progress and the ladder's notices
struct SpinnerSink {
    spinner: ProgressBar,
}

impl StatusSink for SpinnerSink {
    fn emit(&self, event: StatusEvent) {
        match event {
            StatusEvent::StrategyStarted { notice, .. } => {
                self.spinner.println(format!("{} {}", style("→").yellow().bold(), notice));
            }
            StatusEvent::StrategyFailed { step, label, message } => {
                tracing::debug!(step, "[Downloader] {} failed: {}", label, message);
            }
            StatusEvent::Progress(p) => self.spinner.set_message(p.status),
        }
    }
}

/// Quiet runs only log; otherwise notices and progress go through the spinner
fn status_sink(spinner: &ProgressBar, quiet: bool) -> Box<dyn StatusSink> {
    if quiet {
        Box::new(LogSink)
    } else {
        Box::new(SpinnerSink {
            spinner: spinner.clone(),
        })
    }
}

fn create_spinner(msg: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(summary: &BatchSummary) -> ExitCode {
    if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report(summary: &BatchSummary) {
    for item in &summary.results {
        match item.outcome.error() {
            None => {
                let names: Vec<&str> = item.outcome.files().iter().map(|f| f.name.as_str()).collect();
                println!(
                    "{} {} {}",
                    style("✓").green().bold(),
                    item.url,
                    style(names.join(", ")).dim()
                );
            }
            Some(error) => println!("{} {} {}", style("✗").red().bold(), item.url, style(error).red()),
        }
    }

    let line = format!("Batch: {}", summary);
    if summary.all_succeeded() {
        println!("\n{}", style(line).green().bold());
    } else {
        println!("\n{}", style(line).yellow().bold());
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let urls = cli.resolve_urls()?;
    if urls.is_empty() {
        eprintln!(
            "{} No URLs provided. Pass URLs or use --batch-file.",
            style("Error:").red().bold()
        );
        return Ok(ExitCode::from(EXIT_NO_URLS));
    }

    let config = cli.options().to_configuration()?;
    if let Some(warning) = ffmpeg_warning(&config, ToolManager::new().ffmpeg_available()) {
        eprintln!("{} {}", style("Warning:").yellow().bold(), warning);
    }

    let downloader = FallbackDownloader::new(YtDlpCli::new());
    tracing::debug!(binary = %downloader.extractor().binary().display(), "[CLI] using yt-dlp");

    let spinner = create_spinner(&format!("Downloading {} URL(s)...", urls.len()), cli.quiet);
    let sink = status_sink(&spinner, cli.quiet);
    let output_dir = config.output_dir.clone();
    let summary = run_batch(
        &downloader,
        &urls,
        &config,
        |_| Destination::Directory(output_dir.clone()),
        DEFAULT_BATCH_PAUSE,
        sink.as_ref(),
    )
    .await;
    spinner.finish_and_clear();

    report(&summary);
    Ok(exit_code(&summary))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.default_log_level());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
