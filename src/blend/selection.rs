use super::metadata::{BlendTrack, TrackSource};
use crate::models::Track;
use std::collections::HashSet;

/// Ordered set of selected tracks, passed from stage to stage
#[derive(Debug, Clone, Default)]
pub struct Selection {
    tracks: Vec<BlendTrack>,
    ids: HashSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track unless its id is already selected. Returns whether it was added.
    pub fn push(&mut self, track: Track, source: TrackSource) -> bool {
        if !self.ids.insert(track.id.clone()) {
            return false;
        }
        self.tracks.push(BlendTrack::new(track, source));
        true
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The accumulator has not yet reached `limit` tracks
    pub fn below(&self, limit: f64) -> bool {
        (self.tracks.len() as f64) < limit
    }

    pub fn count_from(&self, source: TrackSource) -> usize {
        self.tracks.iter().filter(|t| t.source == source).count()
    }

    pub fn into_tracks(self) -> Vec<BlendTrack> {
        self.tracks
    }
}
