//! Secondary index over the episode store: a compact per-episode summary
//! kept in `index.json` so search doesn't need to load every canonical
//! file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::episode::Episode;

/// Number of entries kept in the index; older entries are dropped on
/// insert once the index exceeds this size.
pub const MAX_INDEX_ENTRIES: usize = 1000;

/// Number of keywords retained per index entry (the canonical episode
/// file keeps the full list; the index keeps a smaller slice for speed).
pub const INDEX_KEYWORDS_CAP: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub episode_type: String,
    pub title: String,
    pub relevance_score: f64,
}

impl IndexEntry {
    pub fn from_episode(episode: &Episode) -> Self {
        Self {
            id: episode.episode_id.clone(),
            timestamp: episode.created_at,
            keywords: episode
                .keywords
                .iter()
                .take(INDEX_KEYWORDS_CAP)
                .cloned()
                .collect(),
            tags: episode.tags.clone(),
            episode_type: episode.episode_type.as_str().to_string(),
            title: episode.title.clone(),
            relevance_score: episode.relevance_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EpisodeIndex {
    pub episodes: Vec<IndexEntry>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl EpisodeIndex {
    pub fn empty() -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("created".to_string(), Value::String(Utc::now().to_rfc3339()));
        Self {
            episodes: Vec::new(),
            metadata,
        }
    }

    /// Insert or replace the entry for `entry.id`, then trim to the last
    /// [`MAX_INDEX_ENTRIES`] entries.
    pub fn upsert(&mut self, entry: IndexEntry) {
        self.episodes.retain(|e| e.id != entry.id);
        self.episodes.push(entry);
        if self.episodes.len() > MAX_INDEX_ENTRIES {
            let excess = self.episodes.len() - MAX_INDEX_ENTRIES;
            self.episodes.drain(0..excess);
        }
        self.metadata.insert(
            "last_updated".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.episodes.len();
        self.episodes.retain(|e| e.id != id);
        self.episodes.len() < before
    }

    pub fn find(&self, id: &str) -> Option<&IndexEntry> {
        self.episodes.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            timestamp: Utc::now(),
            keywords: vec![],
            tags: vec![],
            episode_type: "general".to_string(),
            title: "t".to_string(),
            relevance_score: 1.0,
        }
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let mut index = EpisodeIndex::empty();
        index.upsert(entry("ep_1"));
        let mut replacement = entry("ep_1");
        replacement.title = "updated".to_string();
        index.upsert(replacement);
        assert_eq!(index.episodes.len(), 1);
        assert_eq!(index.find("ep_1").unwrap().title, "updated");
    }

    #[test]
    fn upsert_trims_to_max_entries() {
        let mut index = EpisodeIndex::empty();
        for i in 0..(MAX_INDEX_ENTRIES + 5) {
            index.upsert(entry(&format!("ep_{i}")));
        }
        assert_eq!(index.episodes.len(), MAX_INDEX_ENTRIES);
        assert!(index.find("ep_0").is_none());
        assert!(index.find(&format!("ep_{}", MAX_INDEX_ENTRIES + 4)).is_some());
    }

    #[test]
    fn remove_reports_whether_anything_was_removed() {
        let mut index = EpisodeIndex::empty();
        index.upsert(entry("ep_1"));
        assert!(index.remove("ep_1"));
        assert!(!index.remove("ep_1"));
    }
}
