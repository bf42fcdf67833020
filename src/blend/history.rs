use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Number of past blends whose tracks are held back from the next one
pub const HISTORY_DEPTH: usize = 2;

/// One past blend's selected track ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "trackIds", default)]
    pub track_ids: Vec<String>,
}

/// Rolling record of the most recent blends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlendHistory {
    blends: Vec<HistoryEntry>,
}

/// On-disk shape; older files stored a single flat `trackIds` list
#[derive(Debug, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    blends: Option<Vec<HistoryEntry>>,
    #[serde(rename = "trackIds", default)]
    track_ids: Option<Vec<String>>,
}

impl BlendHistory {
    #[cfg(test)]
    pub fn from_entries(entries: Vec<Vec<String>>) -> Self {
        let mut history = Self::default();
        for track_ids in entries {
            history.record(track_ids);
        }
        history
    }

    /// Read history from disk. Any failure yields an empty history.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let Some(file) = read_json::<HistoryFile>(path.as_ref()) else {
            return Self::default();
        };

        let blends = match (file.blends, file.track_ids) {
            (Some(blends), _) => blends,
            (None, Some(track_ids)) => vec![HistoryEntry { track_ids }],
            (None, None) => Vec::new(),
        };

        let mut history = Self { blends };
        history.evict();
        history
    }

    /// Write history to disk. Failures are logged and otherwise ignored.
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let result = serde_json::to_string(self)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!("Could not write blend history to {}: {e}", path.display());
        }
    }

    /// Append a blend's ids, dropping the oldest entries beyond the retained depth
    pub fn record(&mut self, track_ids: Vec<String>) {
        self.blends.push(HistoryEntry { track_ids });
        self.evict();
    }

    fn evict(&mut self) {
        let excess = self.blends.len().saturating_sub(HISTORY_DEPTH);
        self.blends.drain(..excess);
    }

    /// Every track id from the retained blends
    pub fn track_ids(&self) -> HashSet<String> {
        self.blends
            .iter()
            .flat_map(|entry| entry.track_ids.iter().cloned())
            .collect()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.blends
    }

    pub fn is_empty(&self) -> bool {
        self.blends.iter().all(|entry| entry.track_ids.is_empty())
    }
}

/// Static inclusion and exclusion rules, re-read on every run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlendLists {
    pub always_include_ids: Vec<String>,
    pub block_artist_ids: HashSet<String>,
    pub block_track_ids: HashSet<String>,
}

impl BlendLists {
    /// Read the three list files. Missing or unreadable files count as empty lists.
    pub fn load(
        always_include_path: impl AsRef<Path>,
        block_artists_path: impl AsRef<Path>,
        block_tracks_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            always_include_ids: read_json(always_include_path.as_ref()).unwrap_or_default(),
            block_artist_ids: read_json::<Vec<String>>(block_artists_path.as_ref())
                .unwrap_or_default()
                .into_iter()
                .collect(),
            block_track_ids: read_json::<Vec<String>>(block_tracks_path.as_ref())
                .unwrap_or_default()
                .into_iter()
                .collect(),
        }
    }

    pub fn is_artist_blocked(&self, artist_id: &str) -> bool {
        self.block_artist_ids.contains(artist_id)
    }

    pub fn is_track_blocked(&self, track_id: &str) -> bool {
        self.block_track_ids.contains(track_id)
    }
}

/// Best-effort JSON read: a missing, unreadable or malformed file yields `None`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read {}: {e}", path.display());
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed {}: {e}", path.display());
            None
        }
    }
}
