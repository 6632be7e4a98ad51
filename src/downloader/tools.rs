// External tool discovery: yt-dlp and ffmpeg

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use super::extractors::YTDLP_BIN_ENV;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_flag(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

#[derive(Debug, Default)]
pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.detect_tool(tool_type);
        let version = path.as_deref().and_then(|p| self.get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    pub fn ffmpeg_available(&self) -> bool {
        self.detect_tool(ToolType::Ffmpeg).is_some()
    }

    pub fn ytdlp_available(&self) -> bool {
        self.detect_tool(ToolType::YtDlp).is_some()
    }

    fn detect_tool(&self, tool_type: ToolType) -> Option<PathBuf> {
        if tool_type == ToolType::YtDlp {
            if let Some(custom) = std::env::var_os(YTDLP_BIN_ENV).filter(|p| !p.is_empty()) {
                // An explicit override still has to resolve to something runnable
                return which::which(&custom).ok();
            }
        }
        which::which(tool_type.as_str()).ok()
    }

    fn get_version(&self, path: &Path, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_flag()).output() {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "[Tools] {} did not report a version", tool_type.as_str());
                None
            }
        }
    }
}
