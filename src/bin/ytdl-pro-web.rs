use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use ytdl_pro::web::{serve, AppState};
use ytdl_pro::{WebConfig, YtDlpCli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WebConfig::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let extractor = YtDlpCli::new();
    tracing::info!(binary = %extractor.binary().display(), "[Web] using yt-dlp");

    println!(
        "\n{}  {}\n",
        style("ytdl-pro").cyan().bold(),
        style(format!("dashboard on http://{}", config.bind)).dim()
    );

    let state = AppState::new(Box::new(extractor), config);
    serve(state).await?;
    Ok(())
}
