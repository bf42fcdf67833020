use super::catalog::TrackCatalog;
use super::discovery::SeedLimits;
use super::filters::TrackFilters;
use super::history::{BlendHistory, BlendLists};
use super::metadata::{Blend, BlendMetadata, TrackSource};
use super::pools::PoolAggregator;
use super::scoring::BlendScoring;
use super::selection::Selection;
use super::stages::{self, StageContext};
use super::utils::BlendOrdering;
use super::{BlendConfig, BlendStyle};
use crate::models::UserSnapshot;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rand::Rng;

/// Main blend generator
pub struct BlendGenerator {
    config: BlendConfig,
    lists: BlendLists,
    history: BlendHistory,
    now: DateTime<Utc>,
}

impl BlendGenerator {
    pub fn new(config: BlendConfig, lists: BlendLists, history: BlendHistory) -> Self {
        Self {
            config,
            lists,
            history,
            now: Utc::now(),
        }
    }

    /// Fix the clock used for recency weighting
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Select, deduplicate and shuffle a blend of two users' tracks.
    /// The returned `selected_ids` is the entry to record in the blend history.
    pub fn generate_blend<R: Rng + ?Sized>(
        &self,
        user1: &UserSnapshot,
        user2: &UserSnapshot,
        catalog: &dyn TrackCatalog,
        rng: &mut R,
    ) -> Blend {
        let history_ids = self.history.track_ids();
        let aggregator = PoolAggregator::new(user1, user2);

        let candidates = aggregator.candidates(&self.config.sources);
        let candidates = BlendScoring::apply_weighting(candidates, &self.config.weighting, self.now);
        let candidates = BlendScoring::apply_audio_filter(candidates, &self.config.audio_features, catalog);

        let ctx = StageContext {
            config: &self.config,
            user1,
            user2,
            aggregator,
            candidates: &candidates,
            filters: TrackFilters::new(&self.lists, &history_ids),
            catalog,
            always_include_ids: &self.lists.always_include_ids,
        };

        let selection = stages::always_include(Selection::new(), &ctx);
        let selection = match self.config.blend_style {
            BlendStyle::Classic => stages::classic(selection, &ctx),
            BlendStyle::Wild => {
                let selection = stages::shared_recent(selection, &ctx, 0.2);
                let selection = stages::discovery(selection, &ctx, SeedLimits::WILD, TrackSource::WildDiscovery);
                stages::diversity_fill(selection, &ctx)
            }
            BlendStyle::Creative => {
                let selection = stages::shared_recent(selection, &ctx, 0.3);
                let selection = stages::shared_artist(selection, &ctx, 0.5);
                let selection = stages::discovery(selection, &ctx, SeedLimits::CREATIVE, TrackSource::Discovery);
                stages::capped_diversity_fill(selection, &ctx)
            }
        };
        let selection = stages::repeat_backfill(selection, &ctx, history_ids.is_empty());
        if selection.is_empty() {
            warn!("No eligible tracks found for the blend");
        }

        let unique = BlendOrdering::remove_duplicates(selection.into_tracks());
        let selected_ids: Vec<String> = unique.iter().map(|t| t.id().to_string()).collect();

        let mut tracks = BlendOrdering::shuffle_spread(unique, rng);
        tracks.truncate(self.config.playlist_length);

        info!(
            "Blended {} tracks ({:?} style, {} candidates, {} held back by history)",
            tracks.len(),
            self.config.blend_style,
            candidates.len(),
            history_ids.len()
        );

        Blend {
            metadata: BlendMetadata::calculate(&tracks),
            tracks,
            selected_ids,
        }
    }
}
