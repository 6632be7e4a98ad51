// Extractor implementations
//
// `YtDlpCli` is the production extractor: it shells out to the native yt-dlp
// binary, streams progress lines and reports info records. Tests plug in
// scripted extractors through the same `Extractor` trait.

mod cli;
mod progress;

pub use cli::{parse_video_info, YtDlpCli, YTDLP_BIN_ENV};
pub use progress::parse_ytdlp_progress;
