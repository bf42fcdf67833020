use crate::models::{Track, UserSnapshot};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The stage that put a track into the blend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackSource {
    AlwaysInclude,
    Classic,
    SharedRecent,
    SharedArtist,
    Discovery,
    WildDiscovery,
    WildDiversity,
    Diversity,
    Repeat,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::AlwaysInclude => "always-include",
            TrackSource::Classic => "classic",
            TrackSource::SharedRecent => "shared-recent",
            TrackSource::SharedArtist => "shared-artist",
            TrackSource::Discovery => "discovery",
            TrackSource::WildDiscovery => "wild-discovery",
            TrackSource::WildDiversity => "wild-diversity",
            TrackSource::Diversity => "diversity",
            TrackSource::Repeat => "repeat",
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A track in a blend together with why it was selected
#[derive(Debug, Clone, Serialize)]
pub struct BlendTrack {
    pub track: Track,
    pub source: TrackSource,
}

impl BlendTrack {
    pub fn new(track: Track, source: TrackSource) -> Self {
        Self { track, source }
    }

    pub fn id(&self) -> &str {
        &self.track.id
    }

    pub fn main_artist_id(&self) -> Option<&str> {
        self.track.main_artist_id()
    }
}

/// Result of one blend run
#[derive(Debug)]
pub struct Blend {
    /// Final, shuffled playlist order
    pub tracks: Vec<BlendTrack>,
    /// Deduplicated selection order, recorded as this run's history entry
    pub selected_ids: Vec<String>,
    pub metadata: BlendMetadata,
}

/// Summary of a blend's composition
#[derive(Debug, Default)]
pub struct BlendMetadata {
    pub total_tracks: usize,
    pub source_distribution: HashMap<TrackSource, usize>,
    pub artist_count: usize,
}

impl BlendMetadata {
    pub fn calculate(tracks: &[BlendTrack]) -> Self {
        let mut source_distribution = HashMap::new();
        for track in tracks {
            *source_distribution.entry(track.source).or_insert(0) += 1;
        }

        let artist_count = tracks
            .iter()
            .filter_map(BlendTrack::main_artist_id)
            .collect::<HashSet<_>>()
            .len();

        Self {
            total_tracks: tracks.len(),
            source_distribution,
            artist_count,
        }
    }

    /// Percentage of the blend contributed by a source, rounded to the nearest whole number
    pub fn source_percent(&self, source: TrackSource) -> u32 {
        if self.total_tracks == 0 {
            return 0;
        }
        let count = self.source_distribution.get(&source).copied().unwrap_or(0);
        (count as f64 / self.total_tracks as f64 * 100.0).round() as u32
    }
}

/// Genres carried by both users' top artists, in user1's order without repeats
pub fn shared_genres(user1: &UserSnapshot, user2: &UserSnapshot) -> Vec<String> {
    let theirs: HashSet<&str> = user2
        .artists
        .iter()
        .flat_map(|artist| artist.genres.iter().map(String::as_str))
        .collect();

    let mut seen = HashSet::new();
    user1
        .artists
        .iter()
        .flat_map(|artist| artist.genres.iter())
        .filter(|genre| theirs.contains(genre.as_str()) && seen.insert(genre.as_str()))
        .cloned()
        .collect()
}
