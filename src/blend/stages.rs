use super::catalog::TrackCatalog;
use super::config::BlendConfig;
use super::discovery::{self, SeedLimits};
use super::filters::{HistoryRule, TrackFilters};
use super::metadata::TrackSource;
use super::pools::PoolAggregator;
use super::selection::Selection;
use crate::models::{Track, UserSnapshot, well_formed};
use log::{debug, warn};
use std::collections::HashMap;

/// Most tracks one main artist may place through the capped diversity fill
const MAX_TRACKS_PER_ARTIST: usize = 2;
/// Most times a genre may be counted during the capped diversity fill
const MAX_TRACKS_PER_GENRE: usize = 5;

/// Everything a selection stage reads. Stages only mutate the `Selection` they are handed.
pub struct StageContext<'a> {
    pub config: &'a BlendConfig,
    pub user1: &'a UserSnapshot,
    pub user2: &'a UserSnapshot,
    pub aggregator: PoolAggregator<'a>,
    /// Aggregated, weighted and filtered candidates
    pub candidates: &'a [Option<Track>],
    pub filters: TrackFilters<'a>,
    pub catalog: &'a dyn TrackCatalog,
    pub always_include_ids: &'a [String],
}

impl StageContext<'_> {
    fn target(&self) -> usize {
        self.config.playlist_length
    }

    fn is_full(&self, selection: &Selection) -> bool {
        selection.len() >= self.target()
    }
}

/// Forced tracks, looked up locally first and remotely otherwise. History is ignored.
pub fn always_include(mut selection: Selection, ctx: &StageContext) -> Selection {
    for id in ctx.always_include_ids {
        let found = match ctx.aggregator.find_track(id) {
            Some(track) => Some(track),
            None => match ctx.catalog.lookup_track(id) {
                Ok(track) => track,
                Err(e) => {
                    warn!("Could not fetch always-include track {id}: {e:#}");
                    None
                }
            },
        };

        match found {
            Some(track) if ctx.filters.is_eligible(&track, HistoryRule::Ignore) => {
                selection.push(track, TrackSource::AlwaysInclude);
            }
            Some(_) => debug!("Always-include track {id} is blocked or malformed"),
            None => debug!("Always-include track {id} not found"),
        }
    }

    debug!("always-include: {} tracks", selection.count_from(TrackSource::AlwaysInclude));
    selection
}

/// Tracks present in both users' libraries
pub fn classic(mut selection: Selection, ctx: &StageContext) -> Selection {
    let shared = ctx.aggregator.shared_library_ids();

    for track in well_formed(ctx.candidates) {
        if ctx.is_full(&selection) {
            break;
        }
        if shared.contains(&track.id) && ctx.filters.is_eligible(track, HistoryRule::Suppress) {
            selection.push(track.clone(), TrackSource::Classic);
        }
    }

    debug!("classic: {} tracks", selection.count_from(TrackSource::Classic));
    selection
}

/// Tracks both users played recently, while the selection is below `share` of the target
pub fn shared_recent(mut selection: Selection, ctx: &StageContext, share: f64) -> Selection {
    let limit = ctx.config.share(share);

    for track in ctx.aggregator.shared_recent() {
        if !selection.below(limit) {
            break;
        }
        if ctx.filters.is_eligible(&track, HistoryRule::Suppress) {
            selection.push(track, TrackSource::SharedRecent);
        }
    }

    debug!("shared-recent: {} tracks", selection.count_from(TrackSource::SharedRecent));
    selection
}

/// Tracks whose main artist is a top artist of both users, while the selection is below `share`
pub fn shared_artist(mut selection: Selection, ctx: &StageContext, share: f64) -> Selection {
    let limit = ctx.config.share(share);
    let shared_artists = ctx.aggregator.shared_artist_ids();

    for track in well_formed(ctx.candidates) {
        if !selection.below(limit) {
            break;
        }
        let is_shared = track
            .main_artist_id()
            .is_some_and(|artist| shared_artists.contains(artist));
        if is_shared && ctx.filters.is_eligible(track, HistoryRule::Suppress) {
            selection.push(track.clone(), TrackSource::SharedArtist);
        }
    }

    debug!("shared-artist: {} tracks", selection.count_from(TrackSource::SharedArtist));
    selection
}

/// Recommendations seeded from both users' tastes
pub fn discovery(
    mut selection: Selection,
    ctx: &StageContext,
    limits: SeedLimits,
    source: TrackSource,
) -> Selection {
    if ctx.config.discovery_percent == 0 || ctx.is_full(&selection) {
        return selection;
    }

    let seeds = discovery::build_seeds(ctx.user1, ctx.user2, limits);
    let recommended = discovery::fetch_recommendations(ctx.catalog, &seeds, ctx.config.discovery_limit());

    for track in recommended {
        if ctx.is_full(&selection) {
            break;
        }
        if ctx.filters.is_eligible(&track, HistoryRule::Suppress) {
            selection.push(track, source);
        }
    }

    debug!("{source}: {} tracks", selection.count_from(source));
    selection
}

/// Fill remaining slots from the candidates with no further constraint
pub fn diversity_fill(mut selection: Selection, ctx: &StageContext) -> Selection {
    for track in well_formed(ctx.candidates) {
        if ctx.is_full(&selection) {
            break;
        }
        if ctx.filters.is_eligible(track, HistoryRule::Suppress) {
            selection.push(track.clone(), TrackSource::WildDiversity);
        }
    }

    debug!("wild-diversity: {} tracks", selection.count_from(TrackSource::WildDiversity));
    selection
}

/// Fill remaining slots while capping each main artist and each genre.
///
/// Counters advance for every unblocked candidate scanned, whether or not it is
/// finally added, and are never reset during the run. Genres come from the main
/// artist only.
// TODO: decide whether genre saturation should count only accepted tracks; today a
// long run of rejected candidates can exhaust a genre before any of it is selected.
pub fn capped_diversity_fill(mut selection: Selection, ctx: &StageContext) -> Selection {
    let mut artist_count: HashMap<&str, usize> = HashMap::new();
    let mut genre_count: HashMap<&str, usize> = HashMap::new();

    for track in well_formed(ctx.candidates) {
        if ctx.is_full(&selection) {
            break;
        }
        if !ctx.filters.is_not_blocked(track) {
            continue;
        }
        let Some(main_artist) = track.main_artist() else {
            continue;
        };

        let plays = artist_count.entry(main_artist.id.as_str()).or_insert(0);
        *plays += 1;
        if *plays > MAX_TRACKS_PER_ARTIST {
            continue;
        }

        let mut genre_ok = true;
        for genre in &main_artist.genres {
            let count = genre_count.entry(genre.as_str()).or_insert(0);
            *count += 1;
            if *count > MAX_TRACKS_PER_GENRE {
                genre_ok = false;
            }
        }
        if !genre_ok {
            continue;
        }

        if ctx.filters.matches_history_rule(track, HistoryRule::Suppress) {
            selection.push(track.clone(), TrackSource::Diversity);
        }
    }

    debug!("diversity: {} tracks", selection.count_from(TrackSource::Diversity));
    selection
}

/// Top up a short blend with a few tracks from the last blends
pub fn repeat_backfill(mut selection: Selection, ctx: &StageContext, history_is_empty: bool) -> Selection {
    if ctx.is_full(&selection) || history_is_empty {
        return selection;
    }

    let allowance = ctx.config.repeat_allowance();
    let mut added = 0;

    for track in well_formed(ctx.candidates) {
        if ctx.is_full(&selection) || added >= allowance {
            break;
        }
        if ctx.filters.is_eligible(track, HistoryRule::RequireRepeat)
            && selection.push(track.clone(), TrackSource::Repeat)
        {
            added += 1;
        }
    }

    debug!("repeat: {added} tracks (allowance {allowance})");
    selection
}
