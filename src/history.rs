//! Rolling history of accepted topics, persisted as a JSON array.
//!
//! Index 0 is the most recent topic. The list is capped on every insert;
//! uniqueness is not enforced here because candidates are deduplicated
//! before they are accepted.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_CAPACITY: usize = 30;

#[derive(Debug, Clone)]
pub struct TopicHistory {
    path: PathBuf,
    capacity: usize,
    topics: Vec<String>,
}

impl TopicHistory {
    /// Load the history file. A missing file is an empty history; a corrupt
    /// one is logged and treated as empty so the next save replaces it.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>, capacity: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let topics = match fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Option<Vec<String>>>(&raw) {
                Ok(list) => list.unwrap_or_default(),
                Err(e) => {
                    warn!(error = %e, "Topic history is corrupted; resetting");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No topic history yet");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read topic history; resetting");
                Vec::new()
            }
        };
        let mut history = Self {
            path,
            capacity,
            topics,
        };
        history.topics.truncate(history.capacity);
        info!(count = history.topics.len(), "Loaded topic history");
        history
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Put `topic` at the front, dropping the oldest entries past capacity.
    pub fn push(&mut self, topic: impl Into<String>) {
        self.topics.insert(0, topic.into());
        self.topics.truncate(self.capacity);
    }

    /// Write the list as a 4-space indented JSON array.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self) -> Result<(), std::io::Error> {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.topics.serialize(&mut ser).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, buf).await?;
        info!(count = self.topics.len(), "Saved topic history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::scratch_dir;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = scratch_dir("history-missing");
        let history = TopicHistory::load(dir.join("past_topics.json"), DEFAULT_CAPACITY).await;
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_empty() {
        let dir = scratch_dir("history-corrupt");
        let path = dir.join("past_topics.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let history = TopicHistory::load(&path, DEFAULT_CAPACITY).await;
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn null_file_is_empty() {
        let dir = scratch_dir("history-null");
        let path = dir.join("past_topics.json");
        tokio::fs::write(&path, "null").await.unwrap();
        assert!(TopicHistory::load(&path, DEFAULT_CAPACITY).await.is_empty());
    }

    #[tokio::test]
    async fn push_keeps_newest_first_and_caps() {
        let dir = scratch_dir("history-cap");
        let mut history = TopicHistory::load(dir.join("h.json"), DEFAULT_CAPACITY).await;
        for n in 0..45 {
            history.push(format!("topic {n}"));
            assert!(history.len() <= DEFAULT_CAPACITY);
            assert_eq!(history.topics()[0], format!("topic {n}"));
        }
        assert_eq!(history.len(), 30);
        assert_eq!(history.topics()[29], "topic 15");
    }

    #[tokio::test]
    async fn save_round_trips_with_four_space_indent() {
        let dir = scratch_dir("history-save");
        let path = dir.join("nested").join("past_topics.json");
        let mut history = TopicHistory::load(&path, DEFAULT_CAPACITY).await;
        history.push("Zero Trust in 2024");
        history.push("Café Security: naïve mistakes");
        history.save().await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.starts_with("[\n    \"Café"));
        assert!(raw.contains("naïve"));

        let reloaded = TopicHistory::load(&path, DEFAULT_CAPACITY).await;
        assert_eq!(
            reloaded.topics(),
            &["Café Security: naïve mistakes", "Zero Trust in 2024"]
        );
    }

    #[tokio::test]
    async fn oversized_file_is_truncated_on_load() {
        let dir = scratch_dir("history-oversized");
        let path = dir.join("h.json");
        let many: Vec<String> = (0..40).map(|n| n.to_string()).collect();
        tokio::fs::write(&path, serde_json::to_string(&many).unwrap())
            .await
            .unwrap();
        let history = TopicHistory::load(&path, DEFAULT_CAPACITY).await;
        assert_eq!(history.len(), 30);
        assert_eq!(history.topics()[0], "0");
    }
}
