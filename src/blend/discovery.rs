use super::catalog::{RecommendationSeeds, TrackCatalog};
use crate::models::{Track, UserSnapshot};
use log::{debug, warn};

/// Used when neither user has anything to seed recommendations with
pub const DEFAULT_SEED_TRACK: &str = "3n3Ppam7vgaVa1iaRUc9Lp";

/// Short-term tracks used as seeds when no other seeds exist
const FALLBACK_SEED_TRACKS: usize = 5;

/// How many seeds of each kind a policy asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedLimits {
    pub per_user: usize,
    pub artists: usize,
    pub genres: usize,
    pub tracks: usize,
}

impl SeedLimits {
    pub const WILD: SeedLimits = SeedLimits {
        per_user: 3,
        artists: 3,
        genres: 3,
        tracks: 2,
    };

    pub const CREATIVE: SeedLimits = SeedLimits {
        per_user: 2,
        artists: 2,
        genres: 2,
        tracks: 1,
    };
}

/// Build recommendation seeds from both users' top artists and short-term tracks.
/// Each user offers up to `per_user` artists and tracks, user1 first, and each combined
/// list is cut to its own limit.
pub fn build_seeds(user1: &UserSnapshot, user2: &UserSnapshot, limits: SeedLimits) -> RecommendationSeeds {
    let users = [user1, user2];

    let artists = users
        .iter()
        .flat_map(|user| user.artists.iter().take(limits.per_user))
        .map(|artist| artist.id.clone())
        .filter(|id| !id.is_empty())
        .take(limits.artists)
        .collect();

    let genres = users
        .iter()
        .flat_map(|user| user.artists.iter())
        .flat_map(|artist| artist.genres.iter().cloned())
        .take(limits.genres)
        .collect();

    let tracks = users
        .iter()
        .flat_map(|user| short_term_ids(user, limits.per_user))
        .take(limits.tracks)
        .collect();

    let mut seeds = RecommendationSeeds {
        artists,
        genres,
        tracks,
    };

    if seeds.is_empty() {
        seeds.tracks = users
            .iter()
            .flat_map(|user| short_term_ids(user, FALLBACK_SEED_TRACKS))
            .take(FALLBACK_SEED_TRACKS)
            .collect();
    }
    if seeds.is_empty() {
        seeds.tracks = vec![DEFAULT_SEED_TRACK.to_string()];
    }

    seeds
}

/// Ids among the first `count` short-term entries
fn short_term_ids(user: &UserSnapshot, count: usize) -> Vec<String> {
    user.short_term
        .iter()
        .take(count)
        .flatten()
        .filter(|track| !track.id.is_empty())
        .map(|track| track.id.clone())
        .collect()
}

/// Ask the catalog for recommendations. Failures are logged and produce no tracks.
pub fn fetch_recommendations(
    catalog: &dyn TrackCatalog,
    seeds: &RecommendationSeeds,
    limit: usize,
) -> Vec<Track> {
    if limit == 0 {
        return Vec::new();
    }

    match catalog.recommendations(seeds, limit) {
        Ok(tracks) => {
            let tracks: Vec<Track> = tracks.into_iter().flatten().collect();
            debug!("Received {} recommended tracks for {:?}", tracks.len(), seeds);
            tracks
        }
        Err(e) => {
            warn!("Could not fetch discovery tracks: {e:#}");
            Vec::new()
        }
    }
}
