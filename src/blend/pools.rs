use super::config::Sources;
use crate::models::{Pool, Track, UserSnapshot, well_formed};
use std::collections::HashSet;

/// The pools feeding the aggregated candidate list, in aggregation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    ShortTerm,
    MediumTerm,
    LongTerm,
    LikedSongs,
    SavedAlbumTracks,
    PlaylistTracks,
    NewReleaseTracks,
}

impl PoolKind {
    pub const ALL: [PoolKind; 7] = [
        PoolKind::ShortTerm,
        PoolKind::MediumTerm,
        PoolKind::LongTerm,
        PoolKind::LikedSongs,
        PoolKind::SavedAlbumTracks,
        PoolKind::PlaylistTracks,
        PoolKind::NewReleaseTracks,
    ];

    /// Pools consulted when deciding whether a user "has" a track
    pub const LIBRARY: [PoolKind; 6] = [
        PoolKind::ShortTerm,
        PoolKind::MediumTerm,
        PoolKind::LongTerm,
        PoolKind::LikedSongs,
        PoolKind::SavedAlbumTracks,
        PoolKind::PlaylistTracks,
    ];

    pub fn of(self, user: &UserSnapshot) -> &Pool {
        match self {
            PoolKind::ShortTerm => &user.short_term,
            PoolKind::MediumTerm => &user.medium_term,
            PoolKind::LongTerm => &user.long_term,
            PoolKind::LikedSongs => &user.liked_songs,
            PoolKind::SavedAlbumTracks => &user.saved_album_tracks,
            PoolKind::PlaylistTracks => &user.playlist_tracks,
            PoolKind::NewReleaseTracks => &user.new_release_tracks,
        }
    }

    pub fn is_enabled(self, sources: &Sources) -> bool {
        match self {
            PoolKind::ShortTerm => sources.short_term,
            PoolKind::MediumTerm => sources.medium_term,
            PoolKind::LongTerm => sources.long_term,
            PoolKind::LikedSongs => sources.liked_songs,
            PoolKind::SavedAlbumTracks => sources.saved_album_tracks,
            PoolKind::PlaylistTracks => sources.playlist_tracks,
            PoolKind::NewReleaseTracks => sources.new_release_tracks,
        }
    }
}

/// Pool aggregation for a pair of users
pub struct PoolAggregator<'a> {
    user1: &'a UserSnapshot,
    user2: &'a UserSnapshot,
}

impl<'a> PoolAggregator<'a> {
    pub fn new(user1: &'a UserSnapshot, user2: &'a UserSnapshot) -> Self {
        Self { user1, user2 }
    }

    /// Concatenate the enabled pools, user1's block before user2's for each pool.
    /// Malformed entries are kept; consumers skip them.
    pub fn candidates(&self, sources: &Sources) -> Pool {
        self.concat(PoolKind::ALL.iter().copied().filter(|kind| kind.is_enabled(sources)))
    }

    fn concat(&self, kinds: impl Iterator<Item = PoolKind>) -> Pool {
        kinds
            .flat_map(|kind| {
                kind.of(self.user1)
                    .iter()
                    .chain(kind.of(self.user2).iter())
                    .cloned()
            })
            .collect()
    }

    /// First well-formed track with the given id anywhere in either user's pools
    pub fn find_track(&self, id: &str) -> Option<Track> {
        PoolKind::ALL
            .iter()
            .flat_map(|kind| [kind.of(self.user1), kind.of(self.user2)])
            .flat_map(|pool| pool.iter().flatten())
            .find(|track| track.id == id)
            .cloned()
    }

    /// Ids present in both users' library pools, ignoring source flags
    pub fn shared_library_ids(&self) -> HashSet<String> {
        let mine = library_ids(self.user1);
        let theirs = library_ids(self.user2);
        mine.intersection(&theirs).cloned().collect()
    }

    /// user1's recently played tracks that user2 has also recently played, in user1's order
    pub fn shared_recent(&self) -> Vec<Track> {
        let theirs: HashSet<&str> = well_formed(&self.user2.recent_tracks)
            .map(|track| track.id.as_str())
            .collect();
        self.user1
            .recent_tracks
            .iter()
            .flatten()
            .filter(|track| theirs.contains(track.id.as_str()))
            .cloned()
            .collect()
    }

    /// Artist ids in both users' top artists
    pub fn shared_artist_ids(&self) -> HashSet<String> {
        let mine: HashSet<&str> = self.user1.artists.iter().map(|a| a.id.as_str()).collect();
        self.user2
            .artists
            .iter()
            .filter(|artist| !artist.id.is_empty() && mine.contains(artist.id.as_str()))
            .map(|artist| artist.id.clone())
            .collect()
    }
}

fn library_ids(user: &UserSnapshot) -> HashSet<String> {
    PoolKind::LIBRARY
        .iter()
        .flat_map(|kind| kind.of(user).iter().flatten())
        .filter(|track| !track.id.is_empty())
        .map(|track| track.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artist;

    fn track(id: &str) -> Option<Track> {
        Some(Track {
            id: id.to_string(),
            artists: vec![Artist {
                id: format!("artist-{id}"),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    fn ids(pool: &Pool) -> Vec<String> {
        pool.iter()
            .map(|entry| entry.as_ref().map(|t| t.id.clone()).unwrap_or_else(|| "-".to_string()))
            .collect()
    }

    #[test]
    fn test_candidates_interleave_pools_by_user() {
        let user1 = UserSnapshot {
            short_term: vec![track("a1"), None],
            liked_songs: vec![track("a2")],
            ..Default::default()
        };
        let user2 = UserSnapshot {
            short_term: vec![track("b1")],
            liked_songs: vec![track("b2")],
            new_release_tracks: vec![track("b3")],
            ..Default::default()
        };

        let aggregator = PoolAggregator::new(&user1, &user2);
        assert_eq!(
            ids(&aggregator.candidates(&Sources::default())),
            vec!["a1", "-", "b1", "a2", "b2", "b3"]
        );

        let sources = Sources {
            short_term: false,
            new_release_tracks: false,
            ..Sources::default()
        };
        assert_eq!(ids(&aggregator.candidates(&sources)), vec!["a2", "b2"]);
    }

    #[test]
    fn test_shared_lookups() {
        let user1 = UserSnapshot {
            long_term: vec![track("both")],
            recent_tracks: vec![track("r2"), track("r1"), None],
            artists: vec![
                Artist { id: "x".to_string(), ..Default::default() },
                Artist { id: "y".to_string(), ..Default::default() },
            ],
            ..Default::default()
        };
        let user2 = UserSnapshot {
            playlist_tracks: vec![track("both"), track("only2")],
            new_release_tracks: vec![track("fresh")],
            recent_tracks: vec![track("r1"), track("r2")],
            artists: vec![Artist { id: "y".to_string(), ..Default::default() }],
            ..Default::default()
        };

        let aggregator = PoolAggregator::new(&user1, &user2);
        let shared = aggregator.shared_library_ids();
        assert_eq!(shared.len(), 1);
        assert!(shared.contains("both"));

        let recent: Vec<_> = aggregator.shared_recent().into_iter().map(|t| t.id).collect();
        assert_eq!(recent, vec!["r2", "r1"]);

        assert_eq!(aggregator.shared_artist_ids().into_iter().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(aggregator.find_track("fresh").map(|t| t.id), Some("fresh".to_string()));
        assert!(aggregator.find_track("missing").is_none());
    }
}
