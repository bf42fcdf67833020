use super::metadata::BlendTrack;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Blend ordering utilities
pub struct BlendOrdering;

impl BlendOrdering {
    /// Drop repeated ids, keeping the first occurrence
    pub fn remove_duplicates(tracks: Vec<BlendTrack>) -> Vec<BlendTrack> {
        let mut seen = HashSet::new();
        tracks
            .into_iter()
            .filter(|track| seen.insert(track.id().to_string()))
            .collect()
    }

    /// Uniform shuffle followed by a single pass that breaks up same-artist neighbours
    pub fn shuffle_spread<R: Rng + ?Sized>(mut tracks: Vec<BlendTrack>, rng: &mut R) -> Vec<BlendTrack> {
        tracks.shuffle(rng);
        Self::spread_artists(&mut tracks);
        tracks
    }

    /// For each position whose main artist matches the previous one, swap in the first
    /// later track by a different artist. Best effort: nothing is retried or moved back,
    /// and tracks without artists are never compared.
    pub fn spread_artists(tracks: &mut [BlendTrack]) {
        let len = tracks.len();
        if len < 3 {
            return;
        }

        for i in 1..len - 1 {
            let Some(previous) = tracks[i - 1].main_artist_id().map(str::to_string) else {
                continue;
            };
            if tracks[i].main_artist_id() != Some(previous.as_str()) {
                continue;
            }

            let replacement = (i + 1..len).find(|&j| {
                tracks[j]
                    .main_artist_id()
                    .is_some_and(|artist| artist != previous)
            });
            if let Some(j) = replacement {
                tracks.swap(i, j);
            }
        }
    }
}
