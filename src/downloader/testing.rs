// Scripted extractor and recording sink for unit tests

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{Configuration, ExtractedMetadata};
use super::traits::{Extractor, StatusEvent, StatusSink};

/// What the scripted extractor does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Produce {
        files: Vec<(String, usize)>,
        title: Option<String>,
    },
    Fail {
        message: String,
        leftovers: Vec<String>,
    },
}

impl Step {
    pub fn produce(files: &[(&str, usize)], title: Option<&str>) -> Self {
        Self::Produce {
            files: files.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            title: title.map(str::to_string),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self::Fail {
            message: message.to_string(),
            leftovers: Vec::new(),
        }
    }

    /// Write these files into the scratch dir, then fail anyway
    pub fn fail_leaving(message: &str, leftovers: &[&str]) -> Self {
        Self::Fail {
            message: message.to_string(),
            leftovers: leftovers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Plays back a fixed list of steps; fails once the list runs out
pub struct ScriptedExtractor {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<(String, Configuration)>>,
}

impl ScriptedExtractor {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn configs(&self) -> Vec<Configuration> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn output_dirs(&self) -> Vec<PathBuf> {
        self.configs().into_iter().map(|c| c.output_dir).collect()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract_and_download(
        &self,
        url: &str,
        config: &Configuration,
        _sink: &dyn StatusSink,
    ) -> Result<ExtractedMetadata, DownloadError> {
        self.calls.lock().unwrap().push((url.to_string(), config.clone()));
        let step = self.script.lock().unwrap().pop_front();

        match step {
            Some(Step::Produce { files, title }) => {
                for (name, size) in &files {
                    let target = config.output_dir.join(name);
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(target, vec![0u8; *size])?;
                }
                Ok(ExtractedMetadata {
                    id: Some("abc123".to_string()),
                    title,
                    uploader: None,
                    entries: 1,
                })
            }
            Some(Step::Fail { message, leftovers }) => {
                for name in &leftovers {
                    std::fs::write(config.output_dir.join(name), b"partial")?;
                }
                Err(DownloadError::Unknown(message))
            }
            None => Err(DownloadError::Unknown("script exhausted".to_string())),
        }
    }
}

/// Keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<(u8, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::StrategyStarted { step, notice } => Some((step, notice)),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::StrategyFailed { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl StatusSink for RecordingSink {
    fn emit(&self, event: StatusEvent) {
        self.events.lock().unwrap().push(event);
    }
}
