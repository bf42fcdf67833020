use super::history::BlendLists;
use crate::models::Track;
use std::collections::HashSet;

/// Whether a stage honours the recent-blend history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRule {
    /// Reject tracks from recent blends
    Suppress,
    /// Ignore history entirely
    Ignore,
    /// Accept only tracks from recent blends
    RequireRepeat,
}

/// Eligibility checks shared by every selection stage
pub struct TrackFilters<'a> {
    lists: &'a BlendLists,
    history_ids: &'a HashSet<String>,
}

impl<'a> TrackFilters<'a> {
    pub fn new(lists: &'a BlendLists, history_ids: &'a HashSet<String>) -> Self {
        Self { lists, history_ids }
    }

    /// Neither the track nor its main artist is on a block list
    pub fn is_not_blocked(&self, track: &Track) -> bool {
        let Some(main_artist) = track.main_artist_id() else {
            return false;
        };
        !self.lists.is_artist_blocked(main_artist) && !self.lists.is_track_blocked(&track.id)
    }

    pub fn in_history(&self, track: &Track) -> bool {
        self.history_ids.contains(&track.id)
    }

    pub fn matches_history_rule(&self, track: &Track, rule: HistoryRule) -> bool {
        match rule {
            HistoryRule::Suppress => !self.in_history(track),
            HistoryRule::Ignore => true,
            HistoryRule::RequireRepeat => self.in_history(track),
        }
    }

    /// Well-formed, not blocked, and acceptable under the stage's history rule
    pub fn is_eligible(&self, track: &Track, rule: HistoryRule) -> bool {
        track.is_well_formed() && self.is_not_blocked(track) && self.matches_history_rule(track, rule)
    }
}
