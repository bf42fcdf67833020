use crate::models::{AudioFeatures, Track};
use anyhow::Result;
use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

/// Seeds biasing a recommendation request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationSeeds {
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub tracks: Vec<String>,
}

impl RecommendationSeeds {
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty() && self.genres.is_empty() && self.tracks.is_empty()
    }
}

/// Remote lookups the blend needs beyond the users' own snapshots
#[cfg_attr(test, automock)]
pub trait TrackCatalog {
    /// Fetch a single track by id
    fn lookup_track(&self, id: &str) -> Result<Option<Track>>;

    /// Request up to `limit` recommended tracks for the given seeds
    fn recommendations(&self, seeds: &RecommendationSeeds, limit: usize) -> Result<Vec<Option<Track>>>;

    /// Audio features keyed by track id; ids without features are absent
    fn audio_features(&self, ids: &[String]) -> Result<HashMap<String, AudioFeatures>>;
}
